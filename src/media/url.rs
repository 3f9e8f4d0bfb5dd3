//! Delivery URL builders. Everything here is pure string assembly.

/// Fixed look of the burned-in subtitles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleStyle {
    pub color: &'static str,
    pub background: &'static str,
    pub gravity: &'static str,
    pub y_offset: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            color: "rgb:FFFFFF",
            background: "rgb:000000",
            gravity: "south",
            y_offset: 50,
        }
    }
}

impl SubtitleStyle {
    /// Transformation component, parameters in the provider's alphabetical order.
    fn transformation(&self, overlay: &str) -> String {
        format!(
            "b_{},co_{},fl_layer_apply,g_{},l_subtitles:{},y_{}",
            self.background, self.color, self.gravity, overlay, self.y_offset
        )
    }
}

/// `<folder>/<clip id>.transcript`
pub fn transcript_id_for(folder: &str, clip_id: &str) -> String {
    format!("{}/{}.transcript", folder.trim_end_matches('/'), clip_id)
}

/// Overlay layers address nested public ids with `:` instead of `/`.
pub fn overlay_id(public_id: &str) -> String {
    public_id.replace('/', ":")
}

fn delivery_root(delivery_base_url: &str, cloud_name: &str) -> String {
    format!("{}/{}", delivery_base_url.trim_end_matches('/'), cloud_name)
}

pub fn compose_subtitled_url(
    delivery_base_url: &str,
    cloud_name: &str,
    video_id: &str,
    transcript_id: &str,
) -> String {
    format!(
        "{}/video/upload/{}/{}",
        delivery_root(delivery_base_url, cloud_name),
        SubtitleStyle::default().transformation(&overlay_id(transcript_id)),
        video_id
    )
}

/// Download URL for a raw file, served as an attachment.
pub fn raw_attachment_url(delivery_base_url: &str, cloud_name: &str, public_id: &str) -> String {
    format!(
        "{}/raw/upload/fl_attachment/{}",
        delivery_root(delivery_base_url, cloud_name),
        public_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://res.cloudinary.com";

    #[test]
    fn test_transcript_id_convention() {
        assert_eq!(transcript_id_for("processed_clips", "clip1"), "processed_clips/clip1.transcript");
        assert_eq!(transcript_id_for("processed_clips/", "clip1"), "processed_clips/clip1.transcript");
    }

    #[test]
    fn test_subtitled_url() {
        let url = compose_subtitled_url(
            BASE,
            "demo",
            "processed_clips/clip1",
            "processed_clips/clip1.transcript",
        );
        assert_eq!(
            url,
            "https://res.cloudinary.com/demo/video/upload/\
             b_rgb:000000,co_rgb:FFFFFF,fl_layer_apply,g_south,\
             l_subtitles:processed_clips:clip1.transcript,y_50/processed_clips/clip1"
        );
    }

    #[test]
    fn test_subtitled_url_is_deterministic() {
        let pairs = [
            ("processed_clips/a", "processed_clips/a.transcript"),
            ("x", "x.transcript"),
            ("deep/nested/id", "deep/nested/id.transcript"),
        ];
        for (video, transcript) in pairs {
            let first = compose_subtitled_url(BASE, "demo", video, transcript);
            let second = compose_subtitled_url(BASE, "demo", video, transcript);
            assert_eq!(first, second);
            assert!(first.ends_with(video));
            assert!(first.contains(&overlay_id(transcript)));
        }
    }

    #[test]
    fn test_raw_attachment_url() {
        assert_eq!(
            raw_attachment_url("https://res.cloudinary.com/", "demo", "processed_clips/clip1.transcript"),
            "https://res.cloudinary.com/demo/raw/upload/fl_attachment/processed_clips/clip1.transcript"
        );
    }
}
