use super::ActionContext;
use crate::executor::Outcome;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One request against the service under test.
///
/// Success is the HTTP status (`expect_status`, or any of 200..400 when
/// unset) and, when `expect_code` is given, the `code` field of the
/// `{code, message, data}` envelope. Both must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpCheck {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_code: Option<Value>,
    /// Variable name → JSON pointer into the response body, e.g.
    /// `token: /data/token`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub save: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

pub(super) fn perform(ctx: &mut ActionContext, check: &HttpCheck) -> Outcome {
    let path = match ctx.substitute(&check.path) {
        Ok(p) => p,
        Err(name) => return undefined(&name),
    };
    let url = if path.starts_with("http://") || path.starts_with("https://") {
        path.clone()
    } else if path.starts_with('/') {
        format!("{}{path}", ctx.base_url)
    } else {
        format!("{}/{path}", ctx.base_url)
    };

    let method = match reqwest::Method::from_bytes(check.method.to_ascii_uppercase().as_bytes()) {
        Ok(m) => m,
        Err(_) => return Outcome::fail(format!("invalid HTTP method '{}'", check.method)),
    };
    let label = format!("{method} {path}");

    let mut req = ctx.client.request(method, &url);
    for (name, value) in &check.headers {
        match ctx.substitute(value) {
            Ok(v) => req = req.header(name.as_str(), v),
            Err(var) => return undefined(&var),
        }
    }
    if let Some(body) = &check.body {
        match substitute_value(ctx, body) {
            Ok(b) => req = req.json(&b),
            Err(var) => return undefined(&var),
        }
    }

    let resp = match req.send() {
        Ok(r) => r,
        Err(e) if e.is_timeout() => return Outcome::fail(format!("{label} timed out")),
        Err(e) => return Outcome::fail(format!("{label} failed: {e}")),
    };
    let status = resp.status().as_u16();
    let text = match resp.text() {
        Ok(t) => t,
        Err(e) => {
            return Outcome::fail(format!("{label} -> {status} body read failed: {e}"));
        }
    };
    let envelope: Option<Value> = serde_json::from_str(&text).ok();

    let status_ok = match check.expect_status {
        Some(expected) => status == expected,
        None => (200..400).contains(&status),
    };
    if !status_ok {
        let want = check
            .expect_status
            .map_or_else(|| "2xx/3xx".to_string(), |s| s.to_string());
        return Outcome::fail(format!(
            "{label} -> {status} (expected {want}){}",
            envelope_message(envelope.as_ref())
        ));
    }

    let code = envelope.as_ref().and_then(|e| e.get("code"));
    if let Some(expected) = &check.expect_code {
        let matched = code.is_some_and(|actual| codes_match(actual, expected));
        if !matched {
            let got = code.map_or_else(|| "none".to_string(), Value::to_string);
            return Outcome::fail(format!(
                "{label} -> {status} code={got} (expected code={expected}){}",
                envelope_message(envelope.as_ref())
            ));
        }
    }

    for (name, pointer) in &check.save {
        let found = envelope.as_ref().and_then(|e| e.pointer(pointer));
        match found {
            Some(Value::String(s)) => ctx.set_var(name.clone(), s.clone()),
            Some(Value::Null) | None => {
                return Outcome::fail(format!("{label} -> {status} response has no {pointer}"));
            }
            Some(other) => ctx.set_var(name.clone(), other.to_string()),
        }
    }

    match code {
        Some(c) => Outcome::pass(format!("{label} -> {status} code={c}")),
        None => Outcome::pass(format!("{label} -> {status}")),
    }
}

fn undefined(name: &str) -> Outcome {
    Outcome::fail(format!("undefined variable ${{{name}}}"))
}

/// Envelope codes compare as JSON values, with `0` and `"0"` treated alike.
fn codes_match(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    let render = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    render(actual) == render(expected)
}

fn envelope_message(envelope: Option<&Value>) -> String {
    envelope
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

fn substitute_value(ctx: &ActionContext, value: &Value) -> std::result::Result<Value, String> {
    Ok(match value {
        Value::String(s) => Value::String(ctx.substitute(s)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| substitute_value(ctx, v))
                .collect::<std::result::Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), substitute_value(ctx, v)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}
