//! Turn collected response header lines into a ProbeResult.

use super::{ProbeError, ProbeResult};

/// Scan header lines for the fields the engine cares about. A missing or
/// unparseable `Content-Length` is `LengthUnavailable`.
pub(crate) fn probe_result(lines: &[String]) -> Result<ProbeResult, ProbeError> {
    let mut length = None;
    let mut accept_ranges = false;
    let mut content_disposition = None;

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            accept_ranges = value.eq_ignore_ascii_case("bytes");
        } else if name.eq_ignore_ascii_case("content-disposition") {
            content_disposition = Some(value.to_string());
        }
    }

    let length = length.ok_or(ProbeError::LengthUnavailable)?;
    Ok(ProbeResult {
        length,
        accept_ranges,
        content_disposition,
    })
}
