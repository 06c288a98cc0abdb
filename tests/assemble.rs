//! End-to-end assembly through the public `a09` API: a full two-pass run, a back-end format,
//! and the embedded `.TEST`/`.ASSERT` harness, exercised together the way a real invocation would.

use a09::driver::{assemble, AssembleOptions};

fn run(source: &str) -> a09::driver::AssembleOutcome {
    let options = AssembleOptions {
        entry_source: source.to_string(),
        ..AssembleOptions::default()
    };
    assemble(&options).unwrap()
}

#[test]
fn assembles_a_small_program_with_a_loop() {
    let src = "\
        ORG $1000
START   LDX #BUF
        CLRA
LOOP    STA ,X+
        DECB
        BNE LOOP
        RTS
BUF     RMB 4
";
    let outcome = run(src);
    assert_eq!(
        outcome.image,
        vec![
            0x8E, 0x10, 0x0B, // LDX #BUF
            0x4F, // CLRA
            0xA7, 0x80, // STA ,X+
            0x5A, // DECB
            0x26, 0xFC, // BNE LOOP
            0x39, // RTS
        ]
    );
}

#[test]
fn srec_backend_wraps_the_image_in_s_records() {
    let options = AssembleOptions {
        entry_source: "        ORG $2000\n        LDA #1\n        RTS\n".to_string(),
        backend: "srec".to_string(),
        ..AssembleOptions::default()
    };
    let outcome = assemble(&options).unwrap();
    let text = String::from_utf8(outcome.image).unwrap();
    assert!(text.lines().any(|l| l.starts_with("S1")));
    assert!(text.lines().any(|l| l.starts_with("S9")));
}

#[test]
fn test_unit_passes_when_its_assertion_holds() {
    let src = "\
        ORG $C000
        .TEST addition
        LDA #2
        ADDA #3
        .ASSERT /a=5, \"2+3 should be 5\"
        RTS
        .ENDTST
";
    let options = AssembleOptions {
        entry_source: src.to_string(),
        run_tests: true,
        ..AssembleOptions::default()
    };
    let outcome = assemble(&options).unwrap();
    let report = outcome.test_report.expect("run_tests requested a report");
    assert!(report.all_passed());
    assert_eq!(report.results[0].name, "addition");
}

#[test]
fn test_unit_fails_when_its_assertion_does_not_hold() {
    let src = "\
        ORG $C000
        .TEST addition
        LDA #2
        ADDA #3
        .ASSERT /a=6, \"2+3 should be 5\"
        RTS
        .ENDTST
";
    let options = AssembleOptions {
        entry_source: src.to_string(),
        run_tests: true,
        ..AssembleOptions::default()
    };
    let outcome = assemble(&options).unwrap();
    let report = outcome.test_report.expect("run_tests requested a report");
    assert!(!report.all_passed());
}

#[test]
fn include_pulls_in_a_virtual_file_and_lists_it_as_a_dependency() {
    let mut virtual_files = std::collections::HashMap::new();
    virtual_files.insert("macros.inc".to_string(), "BUF EQU $4000\n".to_string());
    let options = AssembleOptions {
        entry_source: "        INCLUDE macros.inc\n        ORG $0\n        LDX #BUF\n".to_string(),
        virtual_files,
        ..AssembleOptions::default()
    };
    let outcome = assemble(&options).unwrap();
    assert_eq!(outcome.image, vec![0x8E, 0x40, 0x00]);
    assert!(outcome.dependencies.iter().any(|d| d == "macros.inc"));
}

#[test]
fn fail_on_warning_is_surfaced_through_warnings_failed() {
    let options = AssembleOptions {
        entry_source: "        ORG $0\nHERE    BRA HERE\n        NOP\n".to_string(),
        fail_on_warning: true,
        ..AssembleOptions::default()
    };
    let outcome = assemble(&options).unwrap();
    assert!(outcome.warnings_failed);
}
