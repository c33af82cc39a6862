//! `timeouts { create, update, delete }` block.

use std::time::Duration;

use anyhow::{bail, Result};

use crate::schema::{AttrType, Attribute, Block, NestedBlock};
use crate::state::DynamicValue;

/// Per-operation wait budgets of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub const fn uniform(default: Duration) -> Self {
        Self {
            create: default,
            update: default,
            delete: default,
        }
    }

    pub const fn minutes(minutes: u64) -> Self {
        Self::uniform(Duration::from_secs(minutes * 60))
    }

    /// The schema block offered by every asynchronous resource.
    pub fn block() -> NestedBlock {
        NestedBlock::single(
            "timeouts",
            Block::new(vec![
                Attribute::optional("create", AttrType::String),
                Attribute::optional("update", AttrType::String),
                Attribute::optional("delete", AttrType::String),
            ]),
        )
    }

    /// Applies user overrides from the resource's `timeouts` block.
    pub fn from_config(self, config: &DynamicValue) -> Result<Self> {
        let block = match config.get("timeouts") {
            Some(DynamicValue::List(items)) => items.first(),
            Some(v @ DynamicValue::Map(_)) => Some(v),
            _ => None,
        };
        let Some(block) = block else {
            return Ok(self);
        };

        let read = |key: &str, default: Duration| -> Result<Duration> {
            match block.get(key).and_then(DynamicValue::as_string) {
                Some(s) if !s.is_empty() => parse_duration(s),
                _ => Ok(default),
            }
        };

        Ok(Self {
            create: read("create", self.create)?,
            update: read("update", self.update)?,
            delete: read("delete", self.delete)?,
        })
    }
}

/// Parses Go-style durations such as `30m`, `1h30m`, `90s` or `1.5h`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        bail!("invalid duration {:?}", input);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            bail!("invalid duration {:?}", input);
        }
        let value: f64 = rest[..num_len]
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid duration {:?}", input))?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            "" => bail!("missing unit in duration {:?}", input),
            unit => bail!("unknown unit {:?} in duration {:?}", unit, input),
        };
        rest = &rest[unit_len..];
        total += value * seconds;
    }

    Duration::try_from_secs_f64(total)
        .map_err(|_| anyhow::anyhow!("duration {:?} is out of range", input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{list_value, make_state, null_value, string_value};

    #[test]
    fn parses_go_durations() {
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("m").is_err());
    }

    #[test]
    fn oversized_durations_are_errors() {
        let err = parse_duration("99999999999999999999999h").unwrap_err();
        assert_eq!(err.to_string(), "duration \"99999999999999999999999h\" is out of range");

        let config = make_state(vec![(
            "timeouts",
            list_value(vec![make_state(vec![("delete", string_value("99999999999999999999h"))])]),
        )]);
        assert!(Timeouts::minutes(10).from_config(&config).is_err());
    }

    #[test]
    fn overrides_only_what_is_set() {
        let config = make_state(vec![(
            "timeouts",
            list_value(vec![make_state(vec![
                ("create", string_value("2h")),
                ("update", null_value()),
            ])]),
        )]);

        let timeouts = Timeouts::minutes(10).from_config(&config).unwrap();

        assert_eq!(timeouts.create, Duration::from_secs(7200));
        assert_eq!(timeouts.update, Duration::from_secs(600));
        assert_eq!(timeouts.delete, Duration::from_secs(600));
    }

    #[test]
    fn missing_block_keeps_defaults() {
        let config = make_state(vec![("timeouts", null_value())]);

        assert_eq!(Timeouts::minutes(60).from_config(&config).unwrap(), Timeouts::minutes(60));
    }
}
