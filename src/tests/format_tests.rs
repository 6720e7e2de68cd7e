use crate::detection::{format_result, IpResult, IpSource, OutputFormat};
use std::net::IpAddr;

fn natpmp_result() -> IpResult {
    IpResult::found("203.0.113.45".parse::<IpAddr>().unwrap(), IpSource::NATPMP)
}

#[test]
fn test_format_json_full_exact() {
    assert_eq!(
        format_result(&natpmp_result(), OutputFormat::JsonFull, ""),
        r#"{"ip":"203.0.113.45","type":"ipv4","source":"natpmp"}"#
    );
}

#[test]
fn test_format_json_full_ipv6() {
    let result = IpResult::found("2001:db8::1".parse::<IpAddr>().unwrap(), IpSource::LocalIPv6);
    assert_eq!(
        format_result(&result, OutputFormat::JsonFull, ""),
        r#"{"ip":"2001:db8::1","type":"ipv6","source":"local"}"#
    );
}

#[test]
fn test_format_text_and_json() {
    let result = natpmp_result();
    assert_eq!(format_result(&result, OutputFormat::Text, ""), "203.0.113.45");
    assert_eq!(
        format_result(&result, OutputFormat::Json, ""),
        r#"{"ip":"203.0.113.45"}"#
    );
}

#[test]
fn test_format_jsonp() {
    assert_eq!(
        format_result(&natpmp_result(), OutputFormat::Jsonp, "handleIp"),
        r#"handleIp({"ip":"203.0.113.45"})"#
    );
}

#[test]
fn test_format_failure() {
    let result = IpResult::failed("No default gateway found");

    assert_eq!(format_result(&result, OutputFormat::Text, ""), "");
    assert_eq!(
        format_result(&result, OutputFormat::Json, ""),
        r#"{"error":"No default gateway found"}"#
    );
    assert_eq!(
        format_result(&result, OutputFormat::JsonFull, ""),
        r#"{"error":"No default gateway found"}"#
    );
    assert_eq!(
        format_result(&result, OutputFormat::Jsonp, "cb"),
        r#"cb({"error":"No default gateway found"})"#
    );
}

#[test]
fn test_format_escapes_error() {
    let result = IpResult::failed("bad \"quote\"");
    assert_eq!(
        format_result(&result, OutputFormat::Json, ""),
        r#"{"error":"bad \"quote\""}"#
    );
}

#[test]
fn test_source_tags_and_names() {
    let cases = [
        (IpSource::UPnP, "upnp"),
        (IpSource::NATPMP, "natpmp"),
        (IpSource::PCP, "pcp"),
        (IpSource::LocalIPv6, "local"),
        (IpSource::STUN, "stun"),
        (IpSource::API, "api"),
        (IpSource::Failed, "unknown"),
    ];
    for (source, tag) in cases {
        assert_eq!(source.tag(), tag);
    }
    assert_eq!(IpSource::NATPMP.to_string(), "NAT-PMP (Router)");
}
