//! Rendering of detection results for display or HTTP-style responses

use super::types::IpResult;
use serde::{Deserialize, Serialize};

/// Output format for [`format_result`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Bare address, e.g. `203.0.113.45`
    #[default]
    Text,
    /// `{"ip":"..."}`
    Json,
    /// `{"ip":"...","type":"ipv4","source":"natpmp"}`
    JsonFull,
    /// `callback({"ip":"..."})`
    Jsonp,
}

#[derive(Serialize)]
struct IpBody<'a> {
    ip: &'a str,
}

#[derive(Serialize)]
struct IpFullBody<'a> {
    ip: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    source: &'a str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

fn to_json<T: Serialize>(body: &T) -> String {
    // Plain structs of string slices always serialize
    serde_json::to_string(body).unwrap_or_default()
}

/// Render `result` in `format`
///
/// `callback` names the JSONP wrapper function and is ignored otherwise.
/// Failed results render as `{"error":"..."}` in the JSON formats and as an
/// empty string in `Text`.
pub fn format_result(result: &IpResult, format: OutputFormat, callback: &str) -> String {
    if !result.is_success() {
        let body = to_json(&ErrorBody {
            error: result.error(),
        });
        return match format {
            OutputFormat::Text => String::new(),
            OutputFormat::Json | OutputFormat::JsonFull => body,
            OutputFormat::Jsonp => format!("{}({})", callback, body),
        };
    }

    match format {
        OutputFormat::Text => result.address().to_string(),
        OutputFormat::Json => to_json(&IpBody {
            ip: result.address(),
        }),
        OutputFormat::JsonFull => to_json(&IpFullBody {
            ip: result.address(),
            kind: if result.is_ipv6() { "ipv6" } else { "ipv4" },
            source: result.source().tag(),
        }),
        OutputFormat::Jsonp => format!(
            "{}({})",
            callback,
            to_json(&IpBody {
                ip: result.address(),
            })
        ),
    }
}
