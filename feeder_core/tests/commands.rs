use feeder_core::{
    AutoFeedUpdate, CommandError, MalformedPolicy, ManualCommand, parse_auto_feed,
    parse_manual_feed,
};
use rstest::rstest;

#[rstest]
#[case::explicit(r#"{"action":"feed","grams":25}"#, Some(25.0))]
#[case::default_action(r#"{"grams":7.5}"#, Some(7.5))]
#[case::missing_grams(r#"{"action":"feed"}"#, Some(10.0))]
#[case::string_grams(r#"{"action":"feed","grams":"lots"}"#, Some(10.0))]
#[case::negative_grams(r#"{"action":"feed","grams":-4}"#, Some(0.0))]
#[case::non_string_action(r#"{"action":5,"grams":3}"#, Some(3.0))]
#[case::unknown_action(r#"{"action":"dance","grams":3}"#, None)]
fn manual_feed_fields_fall_back_individually(#[case] payload: &str, #[case] grams: Option<f32>) {
    let cmd = parse_manual_feed(payload, MalformedPolicy::FeedDefault, 10.0);
    match (cmd, grams) {
        (ManualCommand::Feed { request, malformed }, Some(g)) => {
            assert_eq!(request.grams, g);
            assert!(malformed.is_none());
        }
        (ManualCommand::Ignored(CommandError::UnknownAction(a)), None) => assert_eq!(a, "dance"),
        (other, _) => panic!("unexpected: {other:?}"),
    }
}

#[rstest]
#[case::not_json("not-json")]
#[case::empty("")]
#[case::array("[1,2]")]
#[case::number("12")]
fn unparseable_manual_feed_follows_policy(#[case] payload: &str) {
    match parse_manual_feed(payload, MalformedPolicy::FeedDefault, 10.0) {
        ManualCommand::Feed { request, malformed } => {
            assert_eq!(request.grams, 10.0);
            assert!(malformed.is_some());
        }
        other => panic!("fail-open should feed, got {other:?}"),
    }
    assert!(matches!(
        parse_manual_feed(payload, MalformedPolicy::Ignore, 10.0),
        ManualCommand::Ignored(_)
    ));
}

#[test]
fn cancel_action_is_recognised() {
    assert_eq!(
        parse_manual_feed(r#"{"action":"cancel"}"#, MalformedPolicy::FeedDefault, 10.0),
        ManualCommand::Cancel
    );
}

#[test]
fn auto_feed_defaults_fill_missing_fields() {
    assert_eq!(parse_auto_feed("{}").unwrap(), AutoFeedUpdate::default());
    assert_eq!(
        parse_auto_feed(r#"{"enabled":true}"#).unwrap(),
        AutoFeedUpdate {
            enabled: true,
            interval_minutes: 60,
            grams: 10.0
        }
    );
    assert_eq!(
        parse_auto_feed(r#"{"enabled":true,"interval_minutes":15,"grams":-3}"#).unwrap(),
        AutoFeedUpdate {
            enabled: true,
            interval_minutes: 15,
            grams: 0.0
        }
    );
}

#[rstest]
#[case("garbage")]
#[case("[]")]
#[case("true")]
fn auto_feed_rejects_non_objects(#[case] payload: &str) {
    assert!(parse_auto_feed(payload).is_err());
}
