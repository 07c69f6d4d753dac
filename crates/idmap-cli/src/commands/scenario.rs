//! Caching scenarios
//!
//! Each scenario plays two users against the same database: a long-lived
//! session that caches a customer, and short-lived sessions that change the
//! row behind its back. Every observation is checked against the expected
//! cache behaviour; any mismatch makes the command fail.

use std::fmt::Display;

use clap::{Args, ValueEnum};
use idmap_core::model::{Customer, Filter};
use idmap_core::tracking::{EntityRef, EntityState, MergeOption, RefreshMode};
use idmap_store::fixtures::{add_customer, delete_customer, rename_customer};
use idmap_store::{Database, Result, Session};
use serde::Serialize;

#[derive(Debug, Args)]
pub struct ScenarioArgs {
    /// Scenario to run
    #[arg(value_enum)]
    pub name: ScenarioName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioName {
    StaleRead,
    NoTracking,
    NewSession,
    Overwrite,
    Reload,
    Refresh,
    Detach,
    DatabaseValues,
    All,
}

impl ScenarioName {
    const EACH: [ScenarioName; 8] = [
        ScenarioName::StaleRead,
        ScenarioName::NoTracking,
        ScenarioName::NewSession,
        ScenarioName::Overwrite,
        ScenarioName::Reload,
        ScenarioName::Refresh,
        ScenarioName::Detach,
        ScenarioName::DatabaseValues,
    ];

    fn label(&self) -> &'static str {
        match self {
            ScenarioName::StaleRead => "stale-read",
            ScenarioName::NoTracking => "no-tracking",
            ScenarioName::NewSession => "new-session",
            ScenarioName::Overwrite => "overwrite",
            ScenarioName::Reload => "reload",
            ScenarioName::Refresh => "refresh",
            ScenarioName::Detach => "detach",
            ScenarioName::DatabaseValues => "database-values",
            ScenarioName::All => "all",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub scenario: &'static str,
    pub check: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

struct Recorder {
    scenario: &'static str,
    observations: Vec<Observation>,
}

impl Recorder {
    fn check(&mut self, check: &str, expected: impl Display, actual: impl Display) {
        let expected = expected.to_string();
        let actual = actual.to_string();
        self.observations.push(Observation {
            scenario: self.scenario,
            check: check.to_string(),
            passed: expected == actual,
            expected,
            actual,
        });
    }
}

pub fn execute(
    db: &Database,
    args: ScenarioArgs,
    json: bool,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let selected: Vec<ScenarioName> = match args.name {
        ScenarioName::All => ScenarioName::EACH.to_vec(),
        one => vec![one],
    };

    let mut observations = Vec::new();
    for name in selected {
        observations.extend(run(db, name)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&observations)?);
    } else {
        let mut current = "";
        for obs in &observations {
            if obs.scenario != current {
                current = obs.scenario;
                println!("{}", current);
            }
            let mark = if obs.passed { "ok" } else { "FAIL" };
            println!(
                "  [{}] {}: {} (expected {})",
                mark, obs.check, obs.actual, obs.expected
            );
        }
    }

    let failed = observations.iter().filter(|o| !o.passed).count();
    if failed > 0 {
        return Err(format!("{} observation(s) contradicted the expected behaviour", failed).into());
    }
    Ok(())
}

/// Run one scenario and collect its observations
///
/// # Errors
///
/// Any store error raised while playing the scenario.
pub fn run(db: &Database, name: ScenarioName) -> Result<Vec<Observation>> {
    let mut rec = Recorder {
        scenario: name.label(),
        observations: Vec::new(),
    };
    match name {
        ScenarioName::StaleRead => stale_read(db, &mut rec)?,
        ScenarioName::NoTracking => no_tracking(db, &mut rec)?,
        ScenarioName::NewSession => new_session(db, &mut rec)?,
        ScenarioName::Overwrite => overwrite(db, &mut rec)?,
        ScenarioName::Reload => reload(db, &mut rec)?,
        ScenarioName::Refresh => refresh(db, &mut rec)?,
        ScenarioName::Detach => detach(db, &mut rec)?,
        ScenarioName::DatabaseValues => database_values(db, &mut rec)?,
        ScenarioName::All => {
            for each in ScenarioName::EACH {
                rec.observations.extend(run(db, each)?);
            }
        }
    }
    Ok(rec.observations)
}

fn by_key(session: &mut Session, id: i64) -> Result<EntityRef<Customer>> {
    session.query::<Customer>().filter(Filter::key(id)).first()
}

/// Name as a fresh session sees it
fn store_name(db: &Database, id: i64) -> Result<String> {
    let mut session = db.session()?;
    let found = session
        .query::<Customer>()
        .filter(Filter::key(id))
        .no_tracking()
        .first_or_default()?;
    Ok(match found {
        Some(customer) => customer.get().name,
        None => "<none>".to_string(),
    })
}

fn name_of(handle: &EntityRef<Customer>) -> String {
    handle.get().name
}

fn stale_read(db: &Database, rec: &mut Recorder) -> Result<()> {
    let sue_id = add_customer(db, "Sue", Some("VA"))?;
    let mut session = db.session()?;

    let sue = by_key(&mut session, sue_id)?;
    rec.check("first read", "Sue", name_of(&sue));

    rename_customer(db, sue_id, "Susan")?;
    rec.check("store after external rename", "Susan", store_name(db, sue_id)?);

    let again = by_key(&mut session, sue_id)?;
    rec.check("cached read after external rename", "Sue", name_of(&again));
    rec.check("same instance returned", true, again.ptr_eq(&sue));

    delete_customer(db, sue_id)?;
    let gone = session
        .query::<Customer>()
        .filter(Filter::key(sue_id))
        .first_or_default()?;
    rec.check("query after external delete finds row", false, gone.is_some());
    rec.check("old handle keeps values", "Sue", name_of(&sue));
    Ok(())
}

fn no_tracking(db: &Database, rec: &mut Recorder) -> Result<()> {
    let sue_id = add_customer(db, "Sue", Some("VA"))?;
    let mut session = db.session()?;

    let cached = by_key(&mut session, sue_id)?;
    rename_customer(db, sue_id, "Susan")?;

    let live = session
        .query::<Customer>()
        .filter(Filter::key(sue_id))
        .no_tracking()
        .first()?;
    rec.check("no-tracking read", "Susan", name_of(&live));
    rec.check("no-tracking handle state", EntityState::Detached, live.state());
    rec.check("cached instance untouched", "Sue", name_of(&cached));
    rec.check("tracked entities", 1, session.tracked_count());

    delete_customer(db, sue_id)?;
    let gone = session
        .query::<Customer>()
        .filter(Filter::key(sue_id))
        .no_tracking()
        .first_or_default()?;
    rec.check("no-tracking read after delete finds row", false, gone.is_some());
    Ok(())
}

fn new_session(db: &Database, rec: &mut Recorder) -> Result<()> {
    let sue_id = add_customer(db, "Sue", Some("VA"))?;
    let mut first = db.session()?;
    let stale = by_key(&mut first, sue_id)?;

    rename_customer(db, sue_id, "Susan")?;

    let mut second = db.session()?;
    rec.check("new session starts empty", 0, second.tracked_count());
    let fresh = by_key(&mut second, sue_id)?;
    rec.check("new session read", "Susan", name_of(&fresh));
    rec.check("old session still stale", "Sue", name_of(&stale));

    delete_customer(db, sue_id)?;
    let mut third = db.session()?;
    let gone = third
        .query::<Customer>()
        .filter(Filter::key(sue_id))
        .first_or_default()?;
    rec.check("new session after delete finds row", false, gone.is_some());
    Ok(())
}

fn overwrite(db: &Database, rec: &mut Recorder) -> Result<()> {
    let sue_id = add_customer(db, "Sue", Some("VA"))?;
    let mut session = db.session()?;
    let sue = by_key(&mut session, sue_id)?;

    rename_customer(db, sue_id, "Susan")?;
    let refreshed = session
        .query::<Customer>()
        .filter(Filter::key(sue_id))
        .merge(MergeOption::OverwriteChanges)
        .first()?;
    rec.check("overwrite-changes read", "Susan", name_of(&refreshed));
    rec.check("cached instance updated in place", "Susan", name_of(&sue));

    rename_customer(db, sue_id, "Suzy")?;
    let cached = by_key(&mut session, sue_id)?;
    rec.check("later default read is cached again", "Susan", name_of(&cached));

    delete_customer(db, sue_id)?;
    let gone = session
        .query::<Customer>()
        .filter(Filter::key(sue_id))
        .merge(MergeOption::OverwriteChanges)
        .first_or_default()?;
    rec.check("overwrite-changes read after delete finds row", false, gone.is_some());
    rec.check("old handle state", EntityState::Orphaned, session.state(&sue));
    rec.check("old handle keeps values", "Susan", name_of(&sue));
    Ok(())
}

fn reload(db: &Database, rec: &mut Recorder) -> Result<()> {
    let sue_id = add_customer(db, "Sue", Some("VA"))?;
    let mut session = db.session()?;
    let sue = by_key(&mut session, sue_id)?;

    rename_customer(db, sue_id, "Susan")?;
    session.reload(&sue)?;
    rec.check("reloaded entity", "Susan", name_of(&sue));
    rec.check("reloaded state", EntityState::Unchanged, sue.state());
    rec.check("default read after reload", "Susan", name_of(&by_key(&mut session, sue_id)?));

    delete_customer(db, sue_id)?;
    session.reload(&sue)?;
    rec.check("state after reloading deleted row", EntityState::Orphaned, sue.state());
    Ok(())
}

fn refresh(db: &Database, rec: &mut Recorder) -> Result<()> {
    let sue_id = add_customer(db, "Sue", Some("VA"))?;
    let jim_id = add_customer(db, "Jim", Some("VA"))?;
    let mut session = db.session()?;
    let sue = by_key(&mut session, sue_id)?;
    let jim = by_key(&mut session, jim_id)?;

    rename_customer(db, sue_id, "Susan")?;
    rename_customer(db, jim_id, "James")?;

    session.refresh(RefreshMode::StoreWins, &[sue.clone(), jim.clone()])?;
    rec.check("first refreshed entity", "Susan", name_of(&sue));
    rec.check("second refreshed entity", "James", name_of(&jim));

    rename_customer(db, sue_id, "Suzy")?;
    session.refresh(RefreshMode::ClientWins, &[sue.clone()])?;
    rec.check("client-wins keeps local value", "Susan", name_of(&sue));
    rec.check("client-wins marks entity", EntityState::Modified, sue.state());

    delete_customer(db, sue_id)?;
    delete_customer(db, jim_id)?;
    Ok(())
}

fn detach(db: &Database, rec: &mut Recorder) -> Result<()> {
    let sue_id = add_customer(db, "Sue", Some("VA"))?;
    let mut session = db.session()?;
    let sue = by_key(&mut session, sue_id)?;

    rename_customer(db, sue_id, "Susan")?;
    session.detach(&sue)?;
    rec.check("detached state", EntityState::Detached, sue.state());

    let reloaded = by_key(&mut session, sue_id)?;
    rec.check("read after detach", "Susan", name_of(&reloaded));
    rec.check("new instance after detach", false, reloaded.ptr_eq(&sue));
    rec.check("detached handle keeps values", "Sue", name_of(&sue));

    delete_customer(db, sue_id)?;
    Ok(())
}

fn database_values(db: &Database, rec: &mut Recorder) -> Result<()> {
    let sue_id = add_customer(db, "Sue", Some("VA"))?;
    let mut session = db.session()?;
    let sue = by_key(&mut session, sue_id)?;

    rename_customer(db, sue_id, "Susan")?;
    let values = session.database_values(&sue)?;
    let live = values
        .as_ref()
        .and_then(|v| v.get("name"))
        .map(ToString::to_string)
        .unwrap_or_default();
    rec.check("database values", "Susan", live);
    rec.check("cached entity unchanged", "Sue", name_of(&sue));
    rec.check("default read still cached", "Sue", name_of(&by_key(&mut session, sue_id)?));

    delete_customer(db, sue_id)?;
    rec.check(
        "database values after delete present",
        false,
        session.database_values(&sue)?.is_some(),
    );
    Ok(())
}
