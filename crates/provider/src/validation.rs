//! Cross-field checks that the schema alone cannot express.

use thiserror::Error;

use crate::state::DynamicValue;

/// Fields required when NDB provisions a new database server.
const PROVISION_WITH_DBSERVER: &[&str] = &[
    "databasetype",
    "softwareprofileid",
    "softwareprofileversionid",
    "computeprofileid",
    "networkprofileid",
    "dbparameterprofileid",
    "nxclusterid",
    "sshpublickey",
    "timemachineinfo",
];

/// Fields required when the database lands on an existing server.
const PROVISION_ON_EXISTING: &[&str] =
    &["databasetype", "dbparameterprofileid", "timemachineinfo", "nodes"];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("missing required fields are [{}] for {resource}", .fields.join(" "))]
pub struct MissingFields {
    pub resource: String,
    pub fields: Vec<&'static str>,
}

/// Checks the field combinations a resource needs before it is created.
///
/// Unknown values count as present; they are checked again at apply time.
pub fn schema_validation(resource: &str, config: &DynamicValue) -> Result<(), MissingFields> {
    let required: &[&str] = match resource {
        "ndb_provision_database" => {
            let create_dbserver = config
                .get("createdbserver")
                .and_then(DynamicValue::as_bool)
                .unwrap_or(true);
            if create_dbserver {
                PROVISION_WITH_DBSERVER
            } else {
                PROVISION_ON_EXISTING
            }
        }
        _ => &[],
    };

    let fields: Vec<&'static str> = required
        .iter()
        .copied()
        .filter(|f| !is_set(config.get(f)))
        .collect();

    if fields.is_empty() {
        Ok(())
    } else {
        Err(MissingFields {
            resource: resource.to_string(),
            fields,
        })
    }
}

fn is_set(value: Option<&DynamicValue>) -> bool {
    match value {
        None | Some(DynamicValue::Null) => false,
        Some(DynamicValue::String(s)) => !s.is_empty(),
        Some(DynamicValue::List(items)) => !items.is_empty(),
        Some(DynamicValue::Map(m)) => !m.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{bool_value, list_value, make_state, null_value, string_value};

    fn time_machine() -> DynamicValue {
        list_value(vec![make_state(vec![("name", string_value("tm"))])])
    }

    fn full_create() -> Vec<(&'static str, DynamicValue)> {
        vec![
            ("createdbserver", bool_value(true)),
            ("databasetype", string_value("postgres_database")),
            ("softwareprofileid", string_value("sp")),
            ("softwareprofileversionid", string_value("spv")),
            ("computeprofileid", string_value("cp")),
            ("networkprofileid", string_value("np")),
            ("dbparameterprofileid", string_value("dbp")),
            ("nxclusterid", string_value("nx")),
            ("sshpublickey", string_value("ssh-rsa AAA")),
            ("timemachineinfo", time_machine()),
        ]
    }

    #[test]
    fn complete_create_passes() {
        assert_eq!(schema_validation("ndb_provision_database", &make_state(full_create())), Ok(()));
    }

    #[test]
    fn missing_databasetype_is_reported() {
        let mut attrs = full_create();
        attrs.retain(|(k, _)| *k != "databasetype");

        let err = schema_validation("ndb_provision_database", &make_state(attrs)).unwrap_err();

        assert!(err.fields.contains(&"databasetype"));
    }

    #[test]
    fn message_lists_fields_in_order() {
        let config = make_state(vec![
            ("databasetype", string_value("postgres_database")),
            ("nxclusterid", string_value("nx")),
            ("sshpublickey", string_value("ssh-rsa AAA")),
            ("timemachineinfo", time_machine()),
            ("softwareprofileid", string_value("")),
        ]);

        let err = schema_validation("ndb_provision_database", &config).unwrap_err();

        assert_eq!(
            err.to_string(),
            concat!(
                "missing required fields are [softwareprofileid softwareprofileversionid ",
                "computeprofileid networkprofileid dbparameterprofileid] for ndb_provision_database"
            )
        );
    }

    #[test]
    fn existing_server_needs_nodes() {
        let config = make_state(vec![
            ("createdbserver", bool_value(false)),
            ("databasetype", string_value("postgres_database")),
            ("nodes", list_value(vec![make_state(vec![("dbserverid", string_value("db-1"))])])),
            ("timemachineinfo", list_value(vec![])),
            ("dbparameterprofileid", null_value()),
        ]);

        let err = schema_validation("ndb_provision_database", &config).unwrap_err();

        assert_eq!(
            err.to_string(),
            concat!(
                "missing required fields are [dbparameterprofileid timemachineinfo] ",
                "for ndb_provision_database"
            )
        );
    }

    #[test]
    fn unknown_values_count_as_set() {
        let mut attrs = full_create();
        attrs.push(("sshpublickey", DynamicValue::Unknown));

        assert!(schema_validation("ndb_provision_database", &make_state(attrs)).is_ok());
    }

    #[test]
    fn other_resources_have_no_rules() {
        assert!(schema_validation("volume_group", &null_value()).is_ok());
    }
}
