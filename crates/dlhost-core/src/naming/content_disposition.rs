//! Content-Disposition filename extraction.

use super::percent::percent_decode;

/// Extracts the filename from a Content-Disposition header value.
///
/// Understands `filename="quoted"`, bare `filename=token`, and the RFC 5987
/// `filename*=UTF-8''percent-encoded` form; `filename*` takes precedence when
/// both are present.
pub fn parse_content_disposition_filename(value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let raw = raw.trim();

        match key.as_str() {
            "filename*" => {
                let encoded = raw
                    .strip_prefix("UTF-8''")
                    .or_else(|| raw.strip_prefix("utf-8''"));
                if let Some(decoded) = encoded
                    .and_then(percent_decode)
                    .filter(|s| !s.is_empty())
                {
                    return Some(decoded);
                }
            }
            "filename" => {
                let name = unquote(raw);
                if !name.is_empty() {
                    plain = Some(name);
                }
            }
            _ => {}
        }
    }

    plain
}

/// Strips surrounding double quotes and resolves backslash escapes.
fn unquote(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    if escaped {
        out.push('\\');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_filename() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=\"report.pdf\"").as_deref(),
            Some("report.pdf")
        );
    }

    #[test]
    fn bare_token_filename() {
        assert_eq!(
            parse_content_disposition_filename("inline; filename=data.bin").as_deref(),
            Some("data.bin")
        );
    }

    #[test]
    fn extended_form_takes_precedence() {
        assert_eq!(
            parse_content_disposition_filename(
                "attachment; filename=\"fallback.bin\"; filename*=UTF-8''real%20name.dat"
            )
            .as_deref(),
            Some("real name.dat")
        );
    }

    #[test]
    fn escaped_quote_inside_quoted_value() {
        assert_eq!(
            parse_content_disposition_filename(r#"attachment; filename="a\"b.txt""#).as_deref(),
            Some("a\"b.txt")
        );
    }

    #[test]
    fn no_filename_parameter() {
        assert_eq!(parse_content_disposition_filename("attachment"), None);
    }
}
