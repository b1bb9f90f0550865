#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use msgloom_dispatch::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
pump:
  default_limit: 16
backlog:
  accumulate_capz: 12   # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.pump.default_limit, 0);
    assert_eq!(cfg.backlog.accumulate_cap, 64);
}

#[test]
fn rejects_unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn rejects_out_of_range_values() {
    let err = config::load_from_str("version: 1\nbacklog: { accumulate_cap: 0 }\n")
        .expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");

    let err = config::load_from_str("version: 1\npump: { default_limit: 20000 }\n")
        .expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}
