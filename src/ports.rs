use anyhow::{bail, Context, Result};
use std::collections::HashSet;

/// First port of the default application port range.
pub const DEFAULT_PORT_RANGE_START: u16 = 19800;
/// Last port (inclusive) of the default application port range.
pub const DEFAULT_PORT_RANGE_END: u16 = 19899;

/// Half-width of the window probed around a discovered port.
pub const RELATED_PORT_SPAN: u16 = 2;

/// Parse a comma-separated port spec into a deduplicated list of TCP/UDP ports.
///
/// Supported items:
/// - single port number: `19812`
/// - inclusive range: `19800-19899`
/// - surrounding whitespace and empty items are ignored
pub fn parse_port_spec(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        if let Some((a, b)) = item.split_once('-') {
            let start = parse_port_str(a.trim())
                .with_context(|| format!("invalid start in range: {item}"))?;
            let end = parse_port_str(b.trim())
                .with_context(|| format!("invalid end in range: {item}"))?;
            if start > end {
                bail!("invalid range {start}-{end} (start > end)");
            }
            out.extend((start..=end).filter(|p| seen.insert(*p)));
            continue;
        }

        let p = parse_port_str(item).with_context(|| format!("invalid port value: {item}"))?;
        if seen.insert(p) {
            out.push(p);
        }
    }

    Ok(out)
}

/// Inclusive port range; empty when `start > end`.
pub fn port_range(start: u16, end: u16) -> Vec<u16> {
    (start..=end).collect()
}

/// The default application port range, 19800 through 19899.
pub fn default_ports() -> Vec<u16> {
    port_range(DEFAULT_PORT_RANGE_START, DEFAULT_PORT_RANGE_END)
}

/// Ports within two of `port`, clipped to 1..=65535, ascending. Includes `port`.
pub fn related_ports(port: u16) -> Vec<u16> {
    let lo = port.saturating_sub(RELATED_PORT_SPAN).max(1);
    let hi = port.saturating_add(RELATED_PORT_SPAN);
    (lo..=hi).collect()
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
