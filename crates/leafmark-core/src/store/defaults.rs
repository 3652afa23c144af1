use crate::color::DEFAULT_HIGHLIGHT_COLOR;

pub const MIN_FONT_SIZE_PERCENT: u32 = 80;
pub const MAX_FONT_SIZE_PERCENT: u32 = 160;

pub(crate) fn default_scrolled_view() -> bool {
    false
}

pub(crate) fn default_font_size_percent() -> u32 {
    100
}

pub(crate) fn default_highlight_color() -> String {
    DEFAULT_HIGHLIGHT_COLOR.to_string()
}

pub(crate) fn default_highlight_opacity() -> u32 {
    40
}

pub(crate) fn default_follow_host_theme() -> bool {
    true
}

pub(crate) fn default_follow_host_font() -> bool {
    false
}

pub(crate) fn default_note_path() -> String {
    "Book Notes".to_string()
}

pub(crate) fn default_use_same_folder() -> bool {
    true
}

pub(crate) fn default_tags() -> String {
    "book".to_string()
}
