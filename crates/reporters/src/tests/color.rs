use crate::color_severity;
use engine::Severity;

#[test]
fn info_and_low_are_green() {
    assert_eq!(color_severity(Severity::Info), "\x1b[32mINFO\x1b[0m");
    assert_eq!(color_severity(Severity::Low), "\x1b[32mLOW\x1b[0m");
}

#[test]
fn medium_severity_is_yellow() {
    assert_eq!(color_severity(Severity::Medium), "\x1b[33mMEDIUM\x1b[0m");
}

#[test]
fn high_severity_is_red() {
    assert_eq!(color_severity(Severity::High), "\x1b[31mHIGH\x1b[0m");
}
