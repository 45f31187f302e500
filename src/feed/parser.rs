use quick_xml::events::Event;
use quick_xml::Reader;

use super::source::RawItem;
use super::FetchError;

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            b"pubDate" => Some(Field::PubDate),
            _ => None,
        }
    }

    fn slot(self, item: &mut RawItem) -> &mut String {
        match self {
            Field::Title => &mut item.title,
            Field::Link => &mut item.link,
            Field::Description => &mut item.description,
            Field::PubDate => &mut item.pub_date,
        }
    }
}

/// Extracts the `<item>` entries of an RSS 2.0 document, in document order.
///
/// Only the direct `title`, `link`, `description` and `pubDate` children of
/// an item are read. Text and CDATA are both accepted, and inline markup
/// inside a field contributes its text. Elements nested deeper, such as
/// `media:content/media:title`, are ignored. Documents without an `<rss>`
/// root are rejected.
pub fn parse_rss(content: &str) -> Result<Vec<RawItem>, FetchError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations, unknown
    // entities surface as unescape errors.
    let mut reader = Reader::from_str(content);

    let mut items = Vec::new();
    let mut saw_rss = false;
    let mut depth = 0usize;
    // Open <item> and the depth it was opened at
    let mut current: Option<(RawItem, usize)> = None;
    // Field being collected and the depth of its element
    let mut field: Option<(Field, usize)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let item_depth = current.as_ref().map(|(_, d)| *d);
                match (e.name().as_ref(), item_depth) {
                    (b"rss", _) => saw_rss = true,
                    (b"item", None) => current = Some((RawItem::default(), depth)),
                    (tag, Some(item_depth)) if field.is_none() && depth == item_depth + 1 => {
                        field = Field::from_tag(tag).map(|f| (f, depth));
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(text)) => {
                if let (Some((item, _)), Some((f, _))) = (current.as_mut(), field) {
                    let text = text
                        .unescape()
                        .map_err(|e| FetchError::Decode(e.to_string()))?;
                    f.slot(item).push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                if let (Some((item, _)), Some((f, _))) = (current.as_mut(), field) {
                    f.slot(item)
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if field.is_some_and(|(_, field_depth)| field_depth == depth) {
                    field = None;
                }
                if current.as_ref().is_some_and(|(_, item_depth)| *item_depth == depth) {
                    if let Some((item, _)) = current.take() {
                        items.push(trimmed(item));
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FetchError::Decode(e.to_string())),
            _ => {}
        }
    }

    if !saw_rss {
        return Err(FetchError::Decode("document has no <rss> root".to_string()));
    }

    Ok(items)
}

fn trimmed(item: RawItem) -> RawItem {
    RawItem {
        title: item.title.trim().to_string(),
        link: item.link.trim().to_string(),
        description: item.description.trim().to_string(),
        pub_date: item.pub_date.trim().to_string(),
    }
}
