/// Splits `text` into chunks of at most `limit` characters
///
/// Chunks break at the last whitespace inside the window when there is one,
/// so words are only cut when a single word is longer than `limit`. Chunks
/// are trimmed; whitespace-only input yields no chunks. `None` disables
/// splitting.
pub fn split_text(text: &str, limit: Option<usize>) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let limit = match limit {
        Some(limit) if limit > 0 => limit,
        _ => return vec![text.to_string()],
    };

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
        if start >= chars.len() {
            break;
        }

        let end = (start + limit).min(chars.len());
        let mut cut = end;
        if end < chars.len() && !chars[end].is_whitespace() {
            if let Some(space) = (start + 1..end).rev().find(|&i| chars[i].is_whitespace()) {
                cut = space;
            }
        }

        let chunk: String = chars[start..cut].iter().collect();
        let chunk = chunk.trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        start = cut;
    }

    chunks
}
