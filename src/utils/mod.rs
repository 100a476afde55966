/// Maximum number of characters kept from a video title in file names
pub const MAX_TITLE_CHARS: usize = 100;

/// Extract the video id from a watch URL, a short link, or a raw id.
///
/// Anything that does not carry a known marker is assumed to already be an id and is
/// returned unchanged; malformed ids surface later as lookup failures.
pub fn extract_video_id(input: &str) -> String {
    if let Some((_, rest)) = input.split_once("watch?v=") {
        return rest.split('&').next().unwrap_or_default().to_string();
    }

    if let Some((_, rest)) = input.split_once("youtu.be/") {
        return rest.split('?').next().unwrap_or_default().to_string();
    }

    input.to_string()
}

/// Canonical watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Sanitize a video title for use in a file name
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            match c {
                // Keep alphanumeric characters, spaces, hyphens and underscores
                c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' => c,
                // Replace everything else with underscore
                _ => '_',
            }
        })
        .take(MAX_TITLE_CHARS)
        .collect()
}

/// Format a segment start offset as `[HH:MM:SS]`, truncating fractional seconds
pub fn format_timestamp(start_seconds: f64) -> String {
    let total_seconds = start_seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    format!("[{:02}:{:02}:{:02}]", hours, minutes, secs)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Hide all but the last four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }

    let visible: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), visible)
}
