//! `nutanix_ndb_database`
//!
//! Provisions a database through NDB (Era). Provisioning and deletion are
//! asynchronous operations polled through `/operations/{id}`.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use nutanix_client::era::{
    ContinuousSchedule, DailySchedule, Database, DeleteDatabaseRequest, MonthlySchedule, NameValue,
    ProvisionDatabaseRequest, ProvisionNode, QuartelySchedule, Schedule, SnapshotTimeOfDay, Tag,
    TimeMachineInfo, UpdateDatabaseRequest, WeeklySchedule, YearlySchedule,
};
use nutanix_client::StateChangeConf;
use serde::Deserialize;
use tracing::info;

use super::{found, resource_id, Resource};
use crate::client::Clients;
use crate::schema::{id_attribute, AttrType, Attribute, Block, NestedBlock, Schema};
use crate::state::{bool_value, list_value, make_state, string_value, DynamicValue};
use crate::timeouts::Timeouts;
use crate::validation::schema_validation;

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::minutes(75);

pub struct NdbDatabaseResource;

#[derive(Debug, Default, Deserialize)]
struct DatabaseConfig {
    name: String,
    description: Option<String>,
    databasetype: Option<String>,
    softwareprofileid: Option<String>,
    softwareprofileversionid: Option<String>,
    computeprofileid: Option<String>,
    networkprofileid: Option<String>,
    dbparameterprofileid: Option<String>,
    newdbservertimezone: Option<String>,
    nxclusterid: Option<String>,
    sshpublickey: Option<String>,
    createdbserver: Option<bool>,
    dbserverid: Option<String>,
    clustered: Option<bool>,
    autotunestagingdrive: Option<bool>,
    nodecount: Option<i64>,
    vm_password: Option<String>,
    #[serde(default)]
    timemachineinfo: Vec<TimeMachineArgs>,
    #[serde(default)]
    nodes: Vec<NodeArgs>,
    #[serde(default)]
    postgresql_info: Vec<PostgresArgs>,
    #[serde(default)]
    tags: Vec<TagArgs>,
}

/// Removal flags, read from state at destroy time.
#[derive(Debug, Default, Deserialize)]
struct RemovalArgs {
    delete: Option<bool>,
    remove: Option<bool>,
    soft_remove: Option<bool>,
    forced: Option<bool>,
    delete_time_machine: Option<bool>,
    delete_logical_cluster: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeMachineArgs {
    name: String,
    description: Option<String>,
    slaid: Option<String>,
    autotunelogdrive: Option<bool>,
    #[serde(default)]
    schedule: Vec<ScheduleArgs>,
    #[serde(default)]
    tags: Vec<TagArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct ScheduleArgs {
    #[serde(default)]
    snapshottimeofday: Vec<SnapshotTimeOfDayArgs>,
    #[serde(default)]
    continuousschedule: Vec<ContinuousArgs>,
    #[serde(default)]
    weeklyschedule: Vec<WeeklyArgs>,
    #[serde(default)]
    monthlyschedule: Vec<MonthlyArgs>,
    #[serde(default)]
    quartelyschedule: Vec<QuarterlyArgs>,
    #[serde(default)]
    yearlyschedule: Vec<YearlyArgs>,
    #[serde(default)]
    dailyschedule: Vec<DailyArgs>,
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotTimeOfDayArgs {
    hours: i64,
    minutes: i64,
    seconds: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ContinuousArgs {
    enabled: bool,
    logbackupinterval: i64,
    snapshotsperday: i64,
}

#[derive(Debug, Default, Deserialize)]
struct WeeklyArgs {
    enabled: bool,
    dayofweek: String,
}

#[derive(Debug, Default, Deserialize)]
struct MonthlyArgs {
    enabled: bool,
    dayofmonth: i64,
}

#[derive(Debug, Default, Deserialize)]
struct QuarterlyArgs {
    enabled: bool,
    startmonth: String,
    dayofmonth: i64,
}

#[derive(Debug, Default, Deserialize)]
struct YearlyArgs {
    enabled: bool,
    dayofmonth: i64,
    month: String,
}

#[derive(Debug, Default, Deserialize)]
struct DailyArgs {
    enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
struct NodeArgs {
    #[serde(default)]
    properties: Vec<PropertyArgs>,
    vmname: Option<String>,
    networkprofileid: Option<String>,
    dbserverid: Option<String>,
    nx_cluster_id: Option<String>,
    computeprofileid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PropertyArgs {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct PostgresArgs {
    listener_port: Option<String>,
    database_size: Option<String>,
    auto_tune_staging_drive: Option<bool>,
    allocate_pg_hugepage: Option<bool>,
    cluster_database: Option<bool>,
    auth_method: Option<String>,
    database_names: Option<String>,
    db_password: Option<String>,
    pre_create_script: Option<String>,
    post_create_script: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TagArgs {
    tag_id: Option<String>,
    tag_name: Option<String>,
    value: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl TagArgs {
    fn expand(tags: Vec<TagArgs>) -> Vec<Tag> {
        tags.into_iter()
            .map(|t| Tag {
                tag_id: t.tag_id.unwrap_or_default(),
                entity_id: String::new(),
                value: t.value.unwrap_or_default(),
                tag_name: t.tag_name.unwrap_or_default(),
            })
            .collect()
    }
}

impl ScheduleArgs {
    fn expand(self) -> Schedule {
        Schedule {
            snapshot_time_of_day: self
                .snapshottimeofday
                .into_iter()
                .next()
                .map(|s| SnapshotTimeOfDay {
                    hours: s.hours,
                    minutes: s.minutes,
                    seconds: s.seconds,
                }),
            continuous_schedule: self
                .continuousschedule
                .into_iter()
                .next()
                .map(|c| ContinuousSchedule {
                    enabled: c.enabled,
                    log_backup_interval: c.logbackupinterval,
                    snapshots_per_day: c.snapshotsperday,
                }),
            weekly_schedule: self.weeklyschedule.into_iter().next().map(|w| WeeklySchedule {
                enabled: w.enabled,
                day_of_week: w.dayofweek,
            }),
            daily_schedule: self
                .dailyschedule
                .into_iter()
                .next()
                .map(|d| DailySchedule { enabled: d.enabled }),
            monthly_schedule: self.monthlyschedule.into_iter().next().map(|m| MonthlySchedule {
                enabled: m.enabled,
                day_of_month: m.dayofmonth,
            }),
            quartely_schedule: self.quartelyschedule.into_iter().next().map(|q| QuartelySchedule {
                enabled: q.enabled,
                start_month: q.startmonth,
                day_of_month: q.dayofmonth,
            }),
            yearly_schedule: self.yearlyschedule.into_iter().next().map(|y| YearlySchedule {
                enabled: y.enabled,
                day_of_month: y.dayofmonth,
                month: y.month,
            }),
        }
    }
}

impl TimeMachineArgs {
    fn expand(self) -> TimeMachineInfo {
        TimeMachineInfo {
            name: self.name,
            description: self.description.unwrap_or_default(),
            sla_id: self.slaid.unwrap_or_default(),
            schedule: self
                .schedule
                .into_iter()
                .next()
                .map(ScheduleArgs::expand)
                .unwrap_or_default(),
            tags: TagArgs::expand(self.tags),
            auto_tune_log_drive: self.autotunelogdrive.unwrap_or(false),
        }
    }
}

impl PostgresArgs {
    /// Engine settings as NDB action arguments. Empty strings and unset
    /// toggles are left out.
    fn action_arguments(self) -> Vec<NameValue> {
        let mut args = Vec::new();
        let mut text = |name: &str, value: Option<String>| {
            if let Some(v) = non_empty(value) {
                args.push(NameValue::new(name, v));
            }
        };
        text("listener_port", self.listener_port);
        text("database_size", self.database_size);
        text("db_password", self.db_password);
        text("database_names", self.database_names);
        text("auth_method", self.auth_method);
        text("pre_create_script", self.pre_create_script);
        text("post_create_script", self.post_create_script);

        if self.auto_tune_staging_drive == Some(true) {
            args.push(NameValue::new("auto_tune_staging_drive", true));
        }
        if let Some(v) = self.allocate_pg_hugepage {
            args.push(NameValue::new("allocate_pg_hugepage", v));
        }
        if let Some(v) = self.cluster_database {
            args.push(NameValue::new("cluster_database", v));
        }
        args
    }
}

impl NodeArgs {
    fn expand(self) -> ProvisionNode {
        ProvisionNode {
            properties: self
                .properties
                .into_iter()
                .map(|p| NameValue::new(&p.name, p.value))
                .collect(),
            vm_name: non_empty(self.vmname),
            network_profile_id: non_empty(self.networkprofileid),
            dbserver_id: non_empty(self.dbserverid),
            nx_cluster_id: non_empty(self.nx_cluster_id),
            compute_profile_id: non_empty(self.computeprofileid),
        }
    }
}

impl RemovalArgs {
    /// The configured removal flags, or a full teardown when none are set.
    fn to_request(&self) -> DeleteDatabaseRequest {
        let flags = [
            self.delete,
            self.remove,
            self.soft_remove,
            self.forced,
            self.delete_time_machine,
            self.delete_logical_cluster,
        ];
        if flags.iter().all(Option::is_none) {
            return DeleteDatabaseRequest::full();
        }
        DeleteDatabaseRequest {
            delete: self.delete.unwrap_or(false),
            remove: self.remove.unwrap_or(false),
            soft_remove: self.soft_remove.unwrap_or(false),
            forced: self.forced.unwrap_or(false),
            delete_time_machine: self.delete_time_machine.unwrap_or(false),
            delete_logical_cluster: self.delete_logical_cluster.unwrap_or(false),
        }
    }
}

impl DatabaseConfig {
    fn expand(self) -> ProvisionDatabaseRequest {
        ProvisionDatabaseRequest {
            create_dbserver: self.createdbserver.unwrap_or(true),
            clustered: self.clustered.unwrap_or(false),
            auto_tune_staging_drive: self.autotunestagingdrive.unwrap_or(false),
            node_count: self.nodecount,
            database_type: non_empty(self.databasetype),
            name: Some(self.name),
            database_description: non_empty(self.description),
            dbserver_id: non_empty(self.dbserverid),
            software_profile_id: non_empty(self.softwareprofileid),
            software_profile_version_id: non_empty(self.softwareprofileversionid),
            compute_profile_id: non_empty(self.computeprofileid),
            network_profile_id: non_empty(self.networkprofileid),
            db_parameter_profile_id: non_empty(self.dbparameterprofileid),
            new_db_server_time_zone: non_empty(self.newdbservertimezone),
            nx_cluster_id: non_empty(self.nxclusterid),
            ssh_public_key: non_empty(self.sshpublickey),
            vm_password: non_empty(self.vm_password),
            time_machine_info: self.timemachineinfo.into_iter().next().map(TimeMachineArgs::expand),
            action_arguments: self
                .postgresql_info
                .into_iter()
                .next()
                .map(PostgresArgs::action_arguments)
                .unwrap_or_default(),
            nodes: self.nodes.into_iter().map(NodeArgs::expand).collect(),
            tags: TagArgs::expand(self.tags),
        }
    }

    /// Only the name, description and tags of a provisioned database change.
    fn update_request(self) -> UpdateDatabaseRequest {
        UpdateDatabaseRequest {
            name: self.name,
            description: self.description.unwrap_or_default(),
            tags: TagArgs::expand(self.tags),
            reset_name: true,
            reset_description: true,
            reset_tags: true,
        }
    }
}

pub(crate) fn flatten_database(db: &Database) -> DynamicValue {
    let properties = db
        .properties
        .iter()
        .map(|p| {
            make_state(vec![("name", string_value(&p.name)), ("value", string_value(&p.value))])
        })
        .collect();
    let tags = db
        .tags
        .iter()
        .map(|t| {
            make_state(vec![
                ("tag_id", string_value(&t.tag_id)),
                ("tag_name", string_value(&t.tag_name)),
                ("value", string_value(&t.value)),
            ])
        })
        .collect();
    make_state(vec![
        ("id", string_value(&db.id)),
        ("database_instance_id", string_value(&db.id)),
        ("name", string_value(&db.name)),
        ("description", string_value(&db.description)),
        ("properties", list_value(properties)),
        ("tags", list_value(tags)),
        ("date_created", string_value(&db.date_created)),
        ("date_modified", string_value(&db.date_modified)),
        ("clone", bool_value(db.clone)),
        ("clustered", bool_value(db.clustered)),
        ("database_name", string_value(&db.database_name)),
        ("type", string_value(&db.database_type)),
        ("status", string_value(&db.status)),
        ("time_machine_id", string_value(&db.time_machine_id)),
        ("time_zone", string_value(&db.time_zone)),
    ])
}

fn single(name: &'static str, attrs: Vec<Attribute>) -> NestedBlock {
    NestedBlock::list(name, Block::new(attrs)).max_items(1)
}

fn schedule_block() -> Block {
    let int = |n| Attribute::required(n, AttrType::Number);
    let flag = || Attribute::required("enabled", AttrType::Bool);
    Block::new(vec![]).with_blocks(vec![
        single("snapshottimeofday", vec![int("hours"), int("minutes"), int("seconds")]),
        single(
            "continuousschedule",
            vec![flag(), int("logbackupinterval"), int("snapshotsperday")],
        ),
        single(
            "weeklyschedule",
            vec![flag(), Attribute::required("dayofweek", AttrType::String)],
        ),
        single("monthlyschedule", vec![flag(), int("dayofmonth")]),
        single(
            "quartelyschedule",
            vec![flag(), Attribute::required("startmonth", AttrType::String), int("dayofmonth")],
        ),
        single(
            "yearlyschedule",
            vec![flag(), int("dayofmonth"), Attribute::required("month", AttrType::String)],
        ),
        single("dailyschedule", vec![flag()]),
    ])
}

fn tags_block() -> NestedBlock {
    NestedBlock::list(
        "tags",
        Block::new(vec![
            Attribute::optional_computed("tag_id", AttrType::String),
            Attribute::optional_computed("tag_name", AttrType::String),
            Attribute::optional_computed("value", AttrType::String),
        ]),
    )
}

/// Waits for an NDB operation to complete.
async fn await_operation(
    clients: &Clients,
    operation_id: &str,
    timeout: Duration,
    what: &str,
) -> Result<()> {
    if operation_id.is_empty() {
        bail!("error: operation ID is an empty string");
    }
    info!(operation = %operation_id, "waiting for {}", what);
    let conf = clients.poll(StateChangeConf::era(timeout));
    clients
        .era()?
        .wait_for_operation_with(operation_id, &conf, &clients.cancel)
        .await
        .with_context(|| format!("error waiting for {}", what))?;
    Ok(())
}

#[async_trait::async_trait]
impl Resource for NdbDatabaseResource {
    fn type_name(&self) -> &'static str {
        "nutanix_ndb_database"
    }

    fn schema(&self) -> Schema {
        let optional = |n| Attribute::optional(n, AttrType::String).force_new();
        let computed = |n| Attribute::computed(n, AttrType::String);

        let mut attrs = vec![
            id_attribute(),
            Attribute::computed("database_instance_id", AttrType::String),
            Attribute::required("name", AttrType::String),
            Attribute::optional_computed("description", AttrType::String),
            optional("databasetype"),
            optional("softwareprofileid"),
            optional("softwareprofileversionid"),
            optional("computeprofileid"),
            optional("networkprofileid"),
            optional("dbparameterprofileid"),
            optional("newdbservertimezone"),
            optional("nxclusterid"),
            optional("sshpublickey").sensitive(),
            Attribute::optional("createdbserver", AttrType::Bool).force_new(),
            optional("dbserverid"),
            Attribute::optional_computed("clustered", AttrType::Bool).force_new(),
            Attribute::optional("autotunestagingdrive", AttrType::Bool).force_new(),
            Attribute::optional("nodecount", AttrType::Number).force_new(),
            optional("vm_password").sensitive(),
            Attribute::computed("date_created", AttrType::String),
            Attribute::computed("date_modified", AttrType::String),
            Attribute::computed("clone", AttrType::Bool),
            computed("database_name"),
            computed("type"),
            computed("status"),
            computed("time_machine_id"),
            computed("time_zone"),
            Attribute::computed(
                "properties",
                AttrType::object_list(vec![
                    ("name", AttrType::String),
                    ("value", AttrType::String),
                ]),
            ),
        ];
        for flag in [
            "delete",
            "remove",
            "soft_remove",
            "forced",
            "delete_time_machine",
            "delete_logical_cluster",
        ] {
            attrs.push(Attribute::optional(flag, AttrType::Bool));
        }

        let time_machine = Block::new(vec![
            Attribute::required("name", AttrType::String),
            Attribute::optional("description", AttrType::String),
            Attribute::optional("slaid", AttrType::String),
            Attribute::optional("autotunelogdrive", AttrType::Bool),
        ])
        .with_blocks(vec![
            NestedBlock::list("schedule", schedule_block()).min_items(1).max_items(1),
            tags_block(),
        ]);

        let node = Block::new(vec![
            Attribute::optional("vmname", AttrType::String),
            Attribute::optional("networkprofileid", AttrType::String),
            Attribute::optional("dbserverid", AttrType::String),
            Attribute::optional("nx_cluster_id", AttrType::String),
            Attribute::optional("computeprofileid", AttrType::String),
        ])
        .with_blocks(vec![NestedBlock::list(
            "properties",
            Block::new(vec![
                Attribute::required("name", AttrType::String),
                Attribute::required("value", AttrType::String),
            ]),
        )]);

        let postgres = Block::new(vec![
            Attribute::required("listener_port", AttrType::String),
            Attribute::optional("database_size", AttrType::String),
            Attribute::optional("auto_tune_staging_drive", AttrType::Bool),
            Attribute::optional("allocate_pg_hugepage", AttrType::Bool),
            Attribute::optional("cluster_database", AttrType::Bool),
            Attribute::optional("auth_method", AttrType::String),
            Attribute::optional("database_names", AttrType::String),
            Attribute::required("db_password", AttrType::String).sensitive(),
            Attribute::optional("pre_create_script", AttrType::String),
            Attribute::optional("post_create_script", AttrType::String),
        ]);

        Schema::new(
            Block::new(attrs)
                .with_blocks(vec![
                    NestedBlock::set("timemachineinfo", time_machine).max_items(1).force_new(),
                    NestedBlock::set("nodes", node).force_new(),
                    NestedBlock::list("postgresql_info", postgres).max_items(1).force_new(),
                    tags_block(),
                    Timeouts::block(),
                ])
                .describe("A database provisioned by Nutanix Database Service."),
        )
    }

    fn validate(&self, config: &DynamicValue) -> Result<()> {
        schema_validation("ndb_provision_database", config)?;
        Ok(())
    }

    async fn create(&self, clients: &Clients, planned: &DynamicValue) -> Result<DynamicValue> {
        schema_validation("ndb_provision_database", planned)?;
        let timeouts = DEFAULT_TIMEOUTS.from_config(planned)?;
        let config: DatabaseConfig = planned.to_typed()?;
        let request = config.expand();

        let reply = clients
            .era()?
            .provision_database(&request)
            .await
            .context("error while provisioning database")?;
        let id = reply.entity_id.clone();
        info!(id = %id, operation = %reply.operation_id, "provisioning nutanix_ndb_database");

        await_operation(
            clients,
            &reply.operation_id,
            timeouts.create,
            &format!("db instance ({}) to create", id),
        )
        .await?;

        let db = clients
            .era()?
            .get_database(&id)
            .await
            .with_context(|| format!("error reading database {}", id))?;
        Ok(flatten_database(&db))
    }

    async fn read(&self, clients: &Clients, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = resource_id(state)?;
        let db = found(clients.era()?.get_database(&id).await)
            .with_context(|| format!("error reading database {}", id))?;
        Ok(db.as_ref().map(flatten_database))
    }

    async fn update(
        &self,
        clients: &Clients,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue> {
        let id = resource_id(prior)?;
        let config: DatabaseConfig = planned.to_typed()?;
        let era = clients.era()?;

        let request = config.update_request();
        info!(id = %id, "updating nutanix_ndb_database");
        era.update_database(&id, &request)
            .await
            .with_context(|| format!("error updating database {}", id))?;

        let db = era
            .get_database(&id)
            .await
            .with_context(|| format!("error reading database {}", id))?;
        Ok(flatten_database(&db))
    }

    async fn delete(&self, clients: &Clients, state: &DynamicValue) -> Result<()> {
        let id = resource_id(state)?;
        let timeouts = DEFAULT_TIMEOUTS.from_config(state)?;
        let removal: RemovalArgs = state.to_typed()?;

        info!(id = %id, "deleting nutanix_ndb_database");
        let Some(reply) = found(clients.era()?.delete_database(&id, &removal.to_request()).await)
            .with_context(|| format!("error deleting database {}", id))?
        else {
            return Ok(());
        };
        await_operation(
            clients,
            &reply.operation_id,
            timeouts.delete,
            &format!("db instance ({}) to delete", id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::testing::ndb_clients;
    use crate::state::int_value;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn time_machine() -> DynamicValue {
        list_value(vec![make_state(vec![
            ("name", string_value("tm-pg")),
            ("slaid", string_value("sla-1")),
            (
                "schedule",
                list_value(vec![make_state(vec![
                    (
                        "snapshottimeofday",
                        list_value(vec![make_state(vec![
                            ("hours", int_value(16)),
                            ("minutes", int_value(0)),
                            ("seconds", int_value(0)),
                        ])]),
                    ),
                    (
                        "weeklyschedule",
                        list_value(vec![make_state(vec![
                            ("enabled", bool_value(true)),
                            ("dayofweek", string_value("WEDNESDAY")),
                        ])]),
                    ),
                ])]),
            ),
        ])])
    }

    fn planned() -> DynamicValue {
        let config = make_state(vec![
            ("name", string_value("pg-inst")),
            ("databasetype", string_value("postgres_database")),
            ("softwareprofileid", string_value("sp-1")),
            ("softwareprofileversionid", string_value("spv-1")),
            ("computeprofileid", string_value("cp-1")),
            ("networkprofileid", string_value("np-1")),
            ("dbparameterprofileid", string_value("dbp-1")),
            ("nxclusterid", string_value("nx-1")),
            ("sshpublickey", string_value("ssh-rsa AAA")),
            ("createdbserver", bool_value(true)),
            ("timemachineinfo", time_machine()),
            (
                "postgresql_info",
                list_value(vec![make_state(vec![
                    ("listener_port", string_value("5432")),
                    ("db_password", string_value("pass")),
                    ("database_names", string_value("testdb1")),
                    ("allocate_pg_hugepage", bool_value(false)),
                ])]),
            ),
        ]);
        NdbDatabaseResource.schema().block.conform(&config)
    }

    #[test]
    fn validate_reports_missing_profiles() {
        let config = make_state(vec![
            ("name", string_value("pg-inst")),
            ("databasetype", string_value("postgres_database")),
        ]);

        let err = NdbDatabaseResource.validate(&config).unwrap_err();

        assert!(err
            .to_string()
            .starts_with(concat!(
                "missing required fields are ",
                "[softwareprofileid softwareprofileversionid"
            )));
    }

    #[test]
    fn expand_builds_action_arguments_and_schedule() {
        let config: DatabaseConfig = planned().to_typed().unwrap();

        let request = config.expand();

        let names: Vec<&str> = request.action_arguments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["listener_port", "db_password", "database_names", "allocate_pg_hugepage"]
        );
        let tm = request.time_machine_info.unwrap();
        assert_eq!(tm.sla_id, "sla-1");
        assert_eq!(tm.schedule.weekly_schedule.unwrap().day_of_week, "WEDNESDAY");
        assert_eq!(tm.schedule.snapshot_time_of_day.unwrap().hours, 16);
        assert!(request.create_dbserver);
    }

    #[test]
    fn flattened_state_updates_to_the_same_database() {
        let db = Database {
            id: "db-1".to_string(),
            name: "pg-inst".to_string(),
            description: "orders".to_string(),
            tags: vec![Tag {
                tag_id: "tag-1".to_string(),
                tag_name: "owner".to_string(),
                value: "dba".to_string(),
                ..Default::default()
            }],
            database_type: "postgres_database".to_string(),
            ..Default::default()
        };
        let state = NdbDatabaseResource.schema().block.conform(&flatten_database(&db));

        let config: DatabaseConfig = state.to_typed().unwrap();
        let request = config.update_request();

        assert_eq!(request.name, db.name);
        assert_eq!(request.description, db.description);
        assert_eq!(request.tags, db.tags);
    }

    #[test]
    fn removal_defaults_to_full_teardown() {
        let none = RemovalArgs::default();
        let soft = RemovalArgs {
            soft_remove: Some(true),
            ..Default::default()
        };

        assert_eq!(none.to_request(), DeleteDatabaseRequest::full());
        assert!(soft.to_request().soft_remove);
        assert!(!soft.to_request().delete);
    }

    #[tokio::test]
    async fn create_provisions_and_waits_for_operation() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/era/v0.9/databases/provision"))
            .and(body_partial_json(json!({
                "databaseType": "postgres_database",
                "name": "pg-inst",
                "createDbserver": true,
                "timeMachineInfo": {"name": "tm-pg", "slaId": "sla-1"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entityId": "db-1",
                "operationId": "op-1",
                "status": "5"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/era/v0.9/operations/op-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "op-1", "status": "5"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/era/v0.9/databases/db-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "db-1",
                "name": "pg-inst",
                "type": "postgres_database",
                "status": "READY",
                "timeMachineId": "tm-1",
                "properties": [{"name": "listener_port", "value": "5432"}]
            })))
            .mount(&server)
            .await;
        let clients = ndb_clients(&server.uri());

        // Act
        let state = NdbDatabaseResource.create(&clients, &planned()).await.unwrap();

        // Assert
        assert_eq!(state.get("id"), Some(&string_value("db-1")));
        assert_eq!(state.get("type"), Some(&string_value("postgres_database")));
        assert_eq!(state.get("time_machine_id"), Some(&string_value("tm-1")));
    }

    #[tokio::test]
    async fn failed_operation_surfaces_message() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/era/v0.9/databases/provision"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entityId": "db-2",
                "operationId": "op-2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/era/v0.9/operations/op-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "4",
                "message": "profile not found",
                "percentageComplete": "10"
            })))
            .mount(&server)
            .await;
        let clients = ndb_clients(&server.uri());

        // Act
        let err = NdbDatabaseResource.create(&clients, &planned()).await.unwrap_err();

        // Assert
        assert!(format!("{:#}", err).contains("error_detail: profile not found"));
    }

    #[tokio::test]
    async fn delete_sends_configured_flags() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/era/v0.9/databases/db-1"))
            .and(body_json(json!({
                "delete": false,
                "remove": true,
                "softRemove": false,
                "forced": false,
                "deleteTimeMachine": true,
                "deleteLogicalCluster": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"operationId": "op-3"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/era/v0.9/operations/op-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "5"})))
            .mount(&server)
            .await;
        let clients = ndb_clients(&server.uri());
        let state = make_state(vec![
            ("id", string_value("db-1")),
            ("remove", bool_value(true)),
            ("delete_time_machine", bool_value(true)),
        ]);

        // Act
        let result = NdbDatabaseResource.delete(&clients, &state).await;

        // Assert
        assert!(result.is_ok());
    }
}
