use ticketdesk_client_core::ApiResponse;
use ticketdesk_client_core::model::DownloadedFile;

/// Turns a successful download response into a named file, preferring the
/// `Content-Disposition` name over `fallback_name`.
pub fn downloaded_file(response: ApiResponse, fallback_name: &str) -> DownloadedFile {
    let file_name = response
        .header("content-disposition")
        .and_then(content_disposition_file_name)
        .unwrap_or_else(|| fallback_name.to_string());
    let content_type = response
        .header("content-type")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    DownloadedFile {
        file_name,
        content_type,
        bytes: response.body,
    }
}

/// File name from a `Content-Disposition` value. `filename*` (RFC 5987)
/// wins over a plain `filename`. Path components are stripped.
#[must_use]
pub fn content_disposition_file_name(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    for parameter in value.split(';').skip(1) {
        let Some((key, raw)) = parameter.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => extended = decode_extended_value(raw),
            "filename" => plain = Some(raw.trim_matches('"').to_string()),
            _ => {}
        }
    }
    extended
        .or(plain)
        .map(|name| strip_path(&name).to_string())
        .filter(|name| !name.is_empty())
}

fn decode_extended_value(raw: &str) -> Option<String> {
    let mut pieces = raw.splitn(3, '\'');
    let charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }
    percent_decode(encoded.trim_matches('"'))
}

fn percent_decode(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'%' => {
                let hex = encoded.get(index + 1..index + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                index += 3;
            }
            byte => {
                decoded.push(byte);
                index += 1;
            }
        }
    }
    String::from_utf8(decoded).ok()
}

fn strip_path(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}
