use std::collections::BTreeMap;
use std::sync::Arc;

use abl_core::errors::AblError;
use abl_core::value::Inputs;
use abl_exp::{
    DefaultExperiment, Experiment, ExperimentDesign, ExperimentSettings, MemoryLogger,
    SimpleExperiment, EXPOSURE_EVENT,
};
use abl_ops::{Assignment, RandomOperator};
use log::Level;
use serde_json::{json, Value};

struct VanillaExperiment;

impl ExperimentDesign for VanillaExperiment {
    fn assign(&self, params: &mut Assignment, inputs: &Inputs) -> Result<(), AblError> {
        let unit = Value::Object(inputs.clone());
        params.set(
            "foo",
            RandomOperator::uniform_choice(json!(["a", "b"])).unit(unit),
        )
    }
}

struct SaltedExperiment;

impl ExperimentDesign for SaltedExperiment {
    fn setup(&self, settings: &mut ExperimentSettings) {
        settings.name = "checkout flow  test".to_string();
        settings.salt = Some("fixed_salt".to_string());
        settings.log_level = Level::Warn;
    }

    fn assign(&self, params: &mut Assignment, inputs: &Inputs) -> Result<(), AblError> {
        params.set(
            "x",
            RandomOperator::random_integer(0, 99).unit(inputs["i"].clone()),
        )
    }
}

struct GatedExperiment;

impl ExperimentDesign for GatedExperiment {
    fn assign(&self, params: &mut Assignment, _inputs: &Inputs) -> Result<(), AblError> {
        params.set("in_experiment", false)?;
        params.set("foo", "bar")
    }
}

struct BrokenExperiment;

impl ExperimentDesign for BrokenExperiment {
    fn assign(&self, params: &mut Assignment, _inputs: &Inputs) -> Result<(), AblError> {
        params.set("foo", RandomOperator::uniform_choice(json!([])).unit(1))
    }
}

fn inputs(value: Value) -> Inputs {
    value.as_object().cloned().unwrap()
}

fn logged<D: ExperimentDesign>(
    design: D,
    input: Value,
) -> (SimpleExperiment<D>, Arc<MemoryLogger>) {
    let logger = Arc::new(MemoryLogger::new());
    let exp = SimpleExperiment::new(design, inputs(input)).with_logger(logger.clone());
    (exp, logger)
}

#[test]
fn vanilla_experiment_logs_one_exposure() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut exp, logger) = logged(VanillaExperiment, json!({"i": 42}));
    assert!(!exp.exposure_logged());
    assert!(logger.is_empty());

    let foo = exp.get("foo").unwrap().unwrap();
    assert!(foo == json!("a") || foo == json!("b"));
    assert_eq!(exp.get("foo").unwrap(), Some(foo.clone()));
    let params = exp.params().unwrap();
    assert_eq!(params.get("foo"), Some(&foo));
    assert!(exp.exposure_logged());

    let records = logger.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.level, Level::Info);
    assert_eq!(record.message, "VanillaExperiment with event type: exposure");
    assert_eq!(record.payload["name"], json!("VanillaExperiment"));
    assert_eq!(record.payload["salt"], json!("VanillaExperiment"));
    assert_eq!(record.payload["event"], json!(EXPOSURE_EVENT));
    assert_eq!(record.payload["inputs"], json!({"i": 42}));
    assert_eq!(record.payload["params"], json!({"foo": foo}));
    assert!(record.payload["time"].is_i64());
    assert!(record.payload.get("extra_data").is_none());
}

#[test]
fn missing_parameter_reads_as_none_or_default() {
    let (mut exp, _) = logged(VanillaExperiment, json!({"i": 1}));
    assert_eq!(exp.get("nope").unwrap(), None);
    assert_eq!(exp.get_or("nope", json!(3)).unwrap(), json!(3));
}

#[test]
fn custom_events_carry_extra_data() {
    let (mut exp, logger) = logged(VanillaExperiment, json!({"i": 1}));
    exp.log_event("purchase", Some(json!({"amount": 12}))).unwrap();
    // a custom event is not an exposure
    assert!(!exp.exposure_logged());

    let records = logger.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, "VanillaExperiment with event type: purchase");
    assert_eq!(records[0].payload["event"], json!("purchase"));
    assert_eq!(records[0].payload["extra_data"], json!({"amount": 12}));

    exp.get("foo").unwrap();
    assert_eq!(logger.len(), 2);
}

#[test]
fn explicit_exposure_suppresses_the_automatic_one() {
    let (mut exp, logger) = logged(VanillaExperiment, json!({"i": 1}));
    exp.log_exposure(Some(json!({"source": "manual"}))).unwrap();
    assert!(exp.exposure_logged());
    exp.get("foo").unwrap();
    exp.params().unwrap();
    assert_eq!(logger.len(), 1);
    assert_eq!(logger.records()[0].payload["extra_data"], json!({"source": "manual"}));
}

#[test]
fn resalting_after_an_exposure_does_not_log_again() {
    let (mut exp, logger) = logged(VanillaExperiment, json!({"i": 4}));
    exp.get("foo").unwrap();
    assert_eq!(logger.len(), 1);

    exp.set_salt("another_salt");
    exp.get("foo").unwrap();
    assert!(exp.exposure_logged());
    assert_eq!(logger.len(), 1);
}

#[test]
fn manual_exposure_after_a_ledger_hit_is_logged_once() {
    let logger = Arc::new(MemoryLogger::new());
    let mut exp = SimpleExperiment::new(VanillaExperiment, inputs(json!({"i": 5})))
        .with_logger(logger.clone())
        .with_ledger(Arc::new(|_: &str, _: &Inputs| true));
    exp.get("foo").unwrap();
    assert!(logger.is_empty());

    exp.log_exposure(None).unwrap();
    exp.get("foo").unwrap();
    assert_eq!(logger.len(), 1);
    assert_eq!(logger.records()[0].payload["event"], json!(EXPOSURE_EVENT));
}

#[test]
fn disabling_auto_logging_keeps_reads_silent() {
    let (mut exp, logger) = logged(VanillaExperiment, json!({"i": 1}));
    exp.set_auto_exposure_logging(false);
    exp.get("foo").unwrap();
    exp.params().unwrap();
    assert!(logger.is_empty());
    assert!(!exp.exposure_logged());
}

#[test]
fn units_outside_the_experiment_are_not_logged() {
    let (mut exp, logger) = logged(GatedExperiment, json!({"i": 1}));
    assert_eq!(exp.get("foo").unwrap(), Some(json!("bar")));
    assert!(!exp.in_experiment());
    assert!(logger.is_empty());
}

#[test]
fn ledger_hits_skip_exposure_logging() {
    let logger = Arc::new(MemoryLogger::new());
    let mut exp = SimpleExperiment::new(VanillaExperiment, inputs(json!({"i": 5})))
        .with_logger(logger.clone())
        .with_ledger(Arc::new(|name: &str, inputs: &Inputs| {
            name == "VanillaExperiment" && inputs["i"] == json!(5)
        }));
    exp.get("foo").unwrap();
    assert!(exp.exposure_logged());
    assert!(logger.is_empty());
}

#[test]
fn adding_inputs_changes_assignments() {
    let mut moved = 0;
    for i in 0..100 {
        let (mut plain, _) = logged(VanillaExperiment, json!({"i": i}));
        let (mut extended, _) = logged(VanillaExperiment, json!({"i": i, "username": "jan"}));
        if plain.get("foo").unwrap() != extended.get("foo").unwrap() {
            moved += 1;
        }
    }
    assert!(moved > 20, "only {moved} of 100 units moved");
}

#[test]
fn setup_controls_name_salt_and_level() {
    let (mut exp, logger) = logged(SaltedExperiment, json!({"i": 3}));
    assert_eq!(exp.name(), "checkout-flow-test");
    assert_eq!(exp.salt(), "fixed_salt");
    assert_eq!(exp.log_level(), Level::Warn);

    let mut expected = Assignment::new("fixed_salt");
    expected
        .set("x", RandomOperator::random_integer(0, 99).unit(3))
        .unwrap();
    assert_eq!(exp.get("x").unwrap().as_ref(), expected.get("x"));
    assert_eq!(logger.records()[0].level, Level::Warn);
}

#[test]
fn renaming_and_resalting_change_the_hash() {
    let mut exp = SimpleExperiment::new(VanillaExperiment, inputs(json!({"i": 9})));
    assert_eq!(exp.salt(), "VanillaExperiment");
    exp.set_name("space  separated\tname");
    assert_eq!(exp.name(), "space-separated-name");
    // without an explicit salt the name is the salt
    assert_eq!(exp.salt(), "space-separated-name");

    let mut moved = 0;
    for i in 0..100 {
        let mut a = SimpleExperiment::new(SaltedExperiment, inputs(json!({"i": i})));
        let mut b = SimpleExperiment::new(SaltedExperiment, inputs(json!({"i": i})));
        let before = a.get("x").unwrap();
        b.set_salt("other_salt");
        if before != b.get("x").unwrap() {
            moved += 1;
        }
        // re-salting drops the cached assignment
        a.set_salt("other_salt");
        assert_eq!(a.get("x").unwrap(), b.get("x").unwrap());
    }
    assert!(moved > 80, "only {moved} of 100 units moved");
}

#[test]
fn renaming_without_a_salt_reassigns() {
    let mut moved = 0;
    for i in 0..100 {
        let mut renamed = SimpleExperiment::new(VanillaExperiment, inputs(json!({"i": i})));
        let before = renamed.get("foo").unwrap();
        renamed.set_name("renamed");
        let after = renamed.get("foo").unwrap();

        let mut fresh = SimpleExperiment::new(VanillaExperiment, inputs(json!({"i": i})));
        fresh.set_name("renamed");
        assert_eq!(after, fresh.get("foo").unwrap());
        if before != after {
            moved += 1;
        }
    }
    assert!(moved > 25, "only {moved} of 100 units moved");
}

#[test]
fn overrides_pin_parameters() {
    let mut overrides = BTreeMap::new();
    overrides.insert("foo".to_string(), json!("pinned"));
    let (exp, logger) = logged(VanillaExperiment, json!({"i": 1}));
    let mut exp = exp.with_overrides(overrides);
    assert_eq!(exp.get("foo").unwrap(), Some(json!("pinned")));
    assert_eq!(logger.records()[0].payload["params"], json!({"foo": "pinned"}));
}

#[test]
fn design_errors_surface_on_read() {
    let (mut exp, logger) = logged(BrokenExperiment, json!({"i": 1}));
    let err = exp.get("foo").unwrap_err();
    assert_eq!(err.code(), "empty-choices");
    assert!(logger.is_empty());
}

#[test]
fn to_json_reports_the_full_record() {
    let (mut exp, logger) = logged(VanillaExperiment, json!({"i": 2}));
    let record = exp.to_json().unwrap();
    assert_eq!(record["name"], json!("VanillaExperiment"));
    assert_eq!(record["inputs"], json!({"i": 2}));
    assert!(record["params"]["foo"].is_string());
    assert!(record.get("event").is_none());
    assert_eq!(logger.len(), 1);
}

#[test]
fn default_experiment_binds_params_and_never_logs() {
    let params = json!({"foo": 1, "bar": "x"}).as_object().cloned().unwrap();
    let mut exp = DefaultExperiment::defaults(inputs(json!({"userid": 1})), params);
    assert_eq!(exp.name(), "default");
    assert_eq!(exp.get("foo").unwrap(), Some(json!(1)));
    assert_eq!(exp.params().unwrap(), inputs(json!({"foo": 1, "bar": "x"})));
    assert!(exp.exposure_logged());
}
