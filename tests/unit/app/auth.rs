use super::*;

#[test]
fn email_then_six_digits_completes() {
    let mut flow = AuthFlow::new();
    flow.submit_email("  a@b.com ").unwrap();
    for i in 0..CODE_LEN - 1 {
        assert_eq!(flow.enter_digit(i, Some('4')).unwrap(), AuthProgress::Pending);
    }
    assert_eq!(
        flow.enter_digit(CODE_LEN - 1, Some('2')).unwrap(),
        AuthProgress::Complete {
            email: "a@b.com".to_string()
        }
    );
}

#[test]
fn digits_can_be_filled_out_of_order() {
    let mut flow = AuthFlow::new();
    flow.submit_email("a@b.com").unwrap();
    for i in (1..CODE_LEN).rev() {
        assert_eq!(flow.enter_digit(i, Some('1')).unwrap(), AuthProgress::Pending);
    }
    assert!(matches!(
        flow.enter_digit(0, Some('9')).unwrap(),
        AuthProgress::Complete { .. }
    ));
}

#[test]
fn clearing_a_slot_keeps_flow_pending() {
    let mut flow = AuthFlow::new();
    flow.submit_email("a@b.com").unwrap();
    assert_eq!(flow.enter_code("12345").unwrap(), AuthProgress::Pending);
    flow.enter_digit(2, None).unwrap();
    assert_eq!(flow.enter_digit(5, Some('6')).unwrap(), AuthProgress::Pending);
    assert!(matches!(
        flow.enter_digit(2, Some('3')).unwrap(),
        AuthProgress::Complete { .. }
    ));
}

#[test]
fn code_before_email_is_rejected() {
    let mut flow = AuthFlow::new();
    assert!(matches!(
        flow.enter_digit(0, Some('1')),
        Err(MemoraError::InvalidTransition { .. })
    ));
    assert_eq!(flow.step(), &AuthStep::EmailEntry);
}

#[test]
fn bad_email_and_bad_digits_are_validation_errors() {
    let mut flow = AuthFlow::new();
    assert!(matches!(flow.submit_email("   "), Err(MemoraError::Validation(_))));
    assert!(matches!(flow.submit_email("nobody"), Err(MemoraError::Validation(_))));
    flow.submit_email("a@b.com").unwrap();
    assert!(matches!(flow.enter_digit(0, Some('x')), Err(MemoraError::Validation(_))));
    assert!(matches!(flow.enter_digit(6, Some('1')), Err(MemoraError::Validation(_))));
    assert!(matches!(
        flow.submit_email("c@d.com"),
        Err(MemoraError::InvalidTransition { .. })
    ));
}

#[test]
fn enter_code_ignores_extra_characters() {
    let mut flow = AuthFlow::new();
    flow.submit_email("a@b.com").unwrap();
    assert!(matches!(
        flow.enter_code("123456789").unwrap(),
        AuthProgress::Complete { .. }
    ));
}

#[test]
fn rejected_code_leaves_slots_untouched() {
    let mut flow = AuthFlow::new();
    flow.submit_email("a@b.com").unwrap();
    flow.enter_digit(5, Some('9')).unwrap();
    let before = flow.clone();

    assert!(matches!(flow.enter_code("12a456"), Err(MemoraError::Validation(_))));
    assert_eq!(flow, before);
    let AuthStep::CodeEntry { digits, .. } = flow.step() else {
        panic!("expected code entry");
    };
    assert_eq!(digits.iter().filter(|d| d.is_some()).count(), 1);
}

#[test]
fn enter_code_before_email_is_rejected() {
    let mut flow = AuthFlow::new();
    assert!(matches!(
        flow.enter_code("123456"),
        Err(MemoraError::InvalidTransition { .. })
    ));
}
