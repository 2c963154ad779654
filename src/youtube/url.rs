//! Video id extraction from YouTube links

use ::url::Url;

/// Extract the video id from a YouTube link.
///
/// Recognizes `youtu.be/<id>`, `youtube.com/watch?v=<id>` and the
/// `/shorts/`, `/embed/` and `/live/` paths. Anything else is `None`.
pub fn video_id(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("shorts") | Some("embed") | Some("live") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_valid_id(&candidate).then_some(candidate)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_watch_links_agree() {
        let short = video_id("https://youtu.be/dQw4w9WgXcQ");
        let watch = video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10");
        assert_eq!(short.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(short, watch);
    }

    #[test]
    fn test_path_forms() {
        for link in [
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?start=5",
            "https://youtube.com/live/dQw4w9WgXcQ",
            "https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
        ] {
            assert_eq!(video_id(link).as_deref(), Some("dQw4w9WgXcQ"), "{}", link);
        }
    }

    #[test]
    fn test_unrecognized_links() {
        assert_eq!(video_id("https://example.com"), None);
        assert_eq!(video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(video_id("https://www.youtube.com/channel/UC123"), None);
        assert_eq!(video_id("https://www.youtube.com/watch"), None);
        assert_eq!(video_id("not a url"), None);
        assert_eq!(video_id("https://youtu.be/"), None);
    }
}
