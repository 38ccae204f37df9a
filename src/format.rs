use chrono::{DateTime, NaiveDateTime, Utc};

/// Render a timestamp relative to `now` the way the feed shows it.
/// Unparseable input is returned unchanged.
pub fn relative_time(timestamp: &str, now: DateTime<Utc>) -> String {
    let Some(then) = parse_timestamp(timestamp) else {
        return timestamp.to_string();
    };

    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "همین الان".to_string()
    } else if minutes < 60 {
        format!("{} دقیقه پیش", minutes)
    } else if hours < 24 {
        format!("{} ساعت پیش", hours)
    } else if days < 7 {
        format!("{} روز پیش", days)
    } else {
        then.format("%Y/%m/%d").to_string()
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive ISO timestamps (no offset) are taken as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Resolve a media path against the backend base URL. Absolute URLs pass through.
pub fn media_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//") {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

/// Percent-encode a single path segment or query value.
pub fn encode_component(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    fn ago(d: Duration) -> String {
        (now() - d).to_rfc3339()
    }

    #[test]
    fn relative_time_buckets() {
        assert_eq!(relative_time(&ago(Duration::seconds(30)), now()), "همین الان");
        assert_eq!(relative_time(&ago(Duration::minutes(5)), now()), "5 دقیقه پیش");
        assert_eq!(relative_time(&ago(Duration::hours(3)), now()), "3 ساعت پیش");
        assert_eq!(relative_time(&ago(Duration::days(2)), now()), "2 روز پیش");
        assert_eq!(relative_time(&ago(Duration::days(30)), now()), "2024/02/19");
    }

    #[test]
    fn relative_time_accepts_naive_iso() {
        assert_eq!(relative_time("2024-03-20T11:00:00.000", now()), "1 ساعت پیش");
        // Just short of the hour still counts in minutes.
        assert_eq!(relative_time("2024-03-20T11:00:00.123456", now()), "59 دقیقه پیش");
    }

    #[test]
    fn relative_time_passes_garbage_through() {
        assert_eq!(relative_time("yesterday-ish", now()), "yesterday-ish");
        assert_eq!(relative_time("", now()), "");
    }

    #[test]
    fn media_url_resolves_relative_paths() {
        assert_eq!(
            media_url("http://localhost:8000/", "/media/posts/a.png"),
            "http://localhost:8000/media/posts/a.png"
        );
        assert_eq!(
            media_url("http://localhost:8000", "https://cdn.example/a.png"),
            "https://cdn.example/a.png"
        );
    }

    #[test]
    fn encode_component_escapes_reserved_and_unicode() {
        assert_eq!(encode_component("a b/c?d"), "a%20b%2Fc%3Fd");
        assert_eq!(encode_component("tech"), "tech");
        assert_eq!(encode_component("اتاق"), "%D8%A7%D8%AA%D8%A7%D9%82");
    }
}
