use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;

use super::source::Decoding;
use super::FetchError;

/// IANA names and aliases for ISO-8859-1.
const LATIN1_LABELS: &[&str] = &[
    "ISO_8859-1:1987",
    "ISO-8859-1",
    "iso-ir-100",
    "ISO_8859-1",
    "latin1",
    "l1",
    "IBM819",
    "CP819",
    "csISOLatin1",
];

pub fn is_latin1_label(label: &str) -> bool {
    LATIN1_LABELS
        .iter()
        .any(|name| name.eq_ignore_ascii_case(label.trim()))
}

/// The `encoding` named by the XML declaration, if the document starts
/// with one.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    // Only the first event is read, so non-UTF-8 bytes later in the
    // body never reach the reader.
    let mut reader = Reader::from_reader(bytes);
    match reader.read_event() {
        Ok(Event::Decl(decl)) => {
            let encoding = decl.encoding()?.ok()?;
            Some(String::from_utf8_lossy(&encoding).into_owned())
        }
        _ => None,
    }
}

/// Turns a fetched body into UTF-8 text according to the source's hint.
///
/// With [`Decoding::Latin1`], bodies declaring an ISO-8859-1 charset are
/// transcoded byte-for-codepoint. Everything else must already be UTF-8.
pub fn decode(bytes: &[u8], hint: Decoding) -> Result<Cow<'_, str>, FetchError> {
    let transcode = hint == Decoding::Latin1
        && declared_encoding(bytes).is_some_and(|label| is_latin1_label(&label));
    if transcode {
        return Ok(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()));
    }

    std::str::from_utf8(bytes)
        .map(Cow::Borrowed)
        .map_err(|e| FetchError::Decode(format!("feed body is not valid UTF-8: {e}")))
}
