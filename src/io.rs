use std::fs;
use std::path::Path;

use crate::error::PagingError;

/// One entry of an access trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOp {
    Read(u32),
    Write(u32, u8),
}

/// Load a backing-store image, which must be exactly `expected_len` bytes
pub fn read_image<P: AsRef<Path>>(path: P, expected_len: usize) -> Result<Vec<u8>, String> {
    let data = fs::read(path.as_ref())
        .map_err(|e| format!("Failed to read image {}: {}", path.as_ref().display(), e))?;
    if data.len() != expected_len {
        return Err(PagingError::StoreSize { expected: expected_len, actual: data.len() }.to_string());
    }
    Ok(data)
}

pub fn write_image<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), String> {
    fs::write(path.as_ref(), data)
        .map_err(|e| format!("Failed to write image {}: {}", path.as_ref().display(), e))
}

pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceOp>, String> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|e| format!("Failed to read trace file: {}", e))?;
    parse_trace(&content)
}

/// Parse a trace: one `r <addr>` or `w <addr> <value>` per line, `#` starts a comment
pub fn parse_trace(content: &str) -> Result<Vec<TraceOp>, String> {
    let mut ops = Vec::new();
    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let op = match tokens.as_slice() {
            ["r", addr] => TraceOp::Read(parse_addr(addr, lineno)?),
            ["w", addr, value] => {
                let value: u8 = value
                    .parse()
                    .map_err(|_| format!("line {}: invalid byte value: {}", lineno + 1, value))?;
                TraceOp::Write(parse_addr(addr, lineno)?, value)
            }
            _ => return Err(format!("line {}: expected `r <addr>` or `w <addr> <value>`", lineno + 1)),
        };
        ops.push(op);
    }
    Ok(ops)
}

fn parse_addr(token: &str, lineno: usize) -> Result<u32, String> {
    let parsed = match token.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| format!("line {}: invalid virtual address: {}", lineno + 1, token))
}

/// Format read results, one value per line
pub fn format_results(results: &[u8]) -> String {
    let mut out = String::with_capacity(results.len() * 4);
    for r in results {
        out.push_str(&r.to_string());
        out.push('\n');
    }
    out
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[u8]) -> Result<(), String> {
    fs::write(path.as_ref(), format_results(results))
        .map_err(|e| format!("Failed to write output file: {}", e))
}
