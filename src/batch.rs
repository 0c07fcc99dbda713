/// Ids per request in [`Client::batch_fetch_and_normalize`](crate::Client::batch_fetch_and_normalize).
///
/// Rentman sits behind a gateway that rejects requests over 102400 bytes;
/// 200 ids stays well below that for typical filter endpoints.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Placeholder replaced by a batch in a command template.
pub const IDS_PLACEHOLDER: &str = "{ids}";

/// Splits a comma-separated id list into comma-joined chunks of at most
/// `batch_size` ids. Blank entries are dropped and order is preserved.
/// A `batch_size` of zero is treated as one.
pub fn split_ids(ids: &str, batch_size: usize) -> Vec<String> {
    let items: Vec<&str> = ids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    items
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.join(","))
        .collect()
}

/// Inserts a batch into a command template: replaces `{ids}` when present,
/// otherwise appends (`costs?project=` + `1,2,3`).
pub fn apply_template(template: &str, batch: &str) -> String {
    if template.contains(IDS_PLACEHOLDER) {
        template.replace(IDS_PLACEHOLDER, batch)
    } else {
        format!("{}{}", template, batch)
    }
}
