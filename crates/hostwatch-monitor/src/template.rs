//! Notification templates.
//!
//! Placeholders:
//!
//! | placeholder | value |
//! |-------------|-------|
//! | `$now`      | current time in the configured zone and format |
//! | `$elapsed`  | time since the previous change, e.g. `3h` or `250ms` |
//! | `$host`     | target hostname |
//! | `$port`     | target port (port watches only) |
//! | `$ipv`      | `4`, `6`, or `??` when no version is configured |

use hostwatch_probe::IpVersion;

const SECOND: i64 = 1000;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Compact rendering of a millisecond span using its largest whole unit,
/// rounded: `1d`, `3h`, `5m`, `12s`, `250ms`.
pub fn format_elapsed(ms: i64) -> String {
    let abs = ms.unsigned_abs();
    for (unit, suffix) in [(DAY, "d"), (HOUR, "h"), (MINUTE, "m"), (SECOND, "s")] {
        if abs >= unit as u64 {
            let rounded = (ms as f64 / unit as f64 + 0.5).floor() as i64;
            return format!("{rounded}{suffix}");
        }
    }
    format!("{ms}ms")
}

/// Values substituted into a template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateContext<'a> {
    pub now: &'a str,
    pub elapsed_ms: i64,
    pub host: &'a str,
    pub port: Option<u16>,
    pub ip_version: Option<IpVersion>,
}

/// Substitute every placeholder in `template`.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    let mut out = template
        .replace("$now", ctx.now)
        .replace("$elapsed", &format_elapsed(ctx.elapsed_ms))
        .replace("$host", ctx.host)
        .replace("$ipv", ctx.ip_version.map_or("??", |v| v.as_str()));
    if let Some(port) = ctx.port {
        out = out.replace("$port", &port.to_string());
    }
    out
}
