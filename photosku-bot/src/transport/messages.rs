//! User-facing texts and reply keyboards

use super::Keyboard;

pub const SEARCH_BUTTON: &str = "Search by article 🔎";
pub const ADD_ITEM_BUTTON: &str = "Add item ®️";
pub const HELP_BUTTON: &str = "Help ❓";
pub const SUPPORT_BUTTON: &str = "Support 🆘";
pub const CANCEL_BUTTON: &str = "Cancel";

pub const DEFAULT_SUPPORT_TEXT: &str = "Contact our support team:

Email: support@example.com
Phone: +1 (123) 456-78-90
Telegram: @support_bot";

pub fn main_menu() -> Keyboard {
    Keyboard::new([[SEARCH_BUTTON, ADD_ITEM_BUTTON], [HELP_BUTTON, SUPPORT_BUTTON]])
}

pub fn cancel_menu() -> Keyboard {
    Keyboard::new([[CANCEL_BUTTON]])
}

pub fn greeting(first_name: &str) -> String {
    if first_name.is_empty() {
        "Hello! 👋".to_string()
    } else {
        format!("Hello, {}! 👋", first_name)
    }
}

pub fn help(first_name: &str) -> String {
    let name = if first_name.is_empty() { "there" } else { first_name };
    format!(
        "Hello, {}.

Available commands:
- {} - add item photos tagged with article number(s)
- {} - find an item by its article number
- {} - show this help
- {} - contact support",
        name, ADD_ITEM_BUTTON, SEARCH_BUTTON, HELP_BUTTON, SUPPORT_BUTTON
    )
}

pub const UPLOAD_PROMPT: &str = "Please send all photos of the item, then send the article numbers \
as a separate message or as a photo caption, in the format: article1, article2, ...

Example: 1.2345, 6.7890";

pub const PHOTO_SAVED: &str =
    "Photo saved. Send more photos or a text with the article numbers.";

pub const UPLOAD_EXPECTS_PHOTOS_OR_ARTICLES: &str =
    "Send more photos or a text with the article numbers. Or a photo with a caption.";

pub const EMPTY_ARTICLE_LIST: &str =
    "No article numbers found. Send them separated by commas, for example: 1.2345, 6.7890";

pub const MEDIA_DOWNLOAD_FAILED: &str =
    "Couldn't get the file from Telegram. Please try again.";

pub const NO_PENDING_PHOTOS: &str =
    "There were no new photos to tag. Send photos first, then the article numbers.";

pub fn apply_summary(succeeded: usize, total: usize) -> String {
    let mut text = format!("Saved {} photo(s)!", succeeded);
    if succeeded < total {
        text.push_str(&format!("\nFailed to save {} photo(s).", total - succeeded));
    }
    text
}

pub fn article_resolution_failed(token: &str) -> String {
    format!(
        "Couldn't save article number {}. Please send the article numbers again.",
        token
    )
}

pub fn upload_cancelled(discard_failures: usize) -> String {
    if discard_failures == 0 {
        "Upload cancelled.".to_string()
    } else {
        format!(
            "Upload cancelled. {} photo(s) could not be removed right now.",
            discard_failures
        )
    }
}

/// Cancel removed the photos but the conversation is still uploading
pub fn upload_cancel_incomplete(deleted: usize, discard_failures: usize) -> String {
    let mut text = format!("Removed {} photo(s).", deleted);
    if discard_failures > 0 {
        text.push_str(&format!(" {} photo(s) could not be removed right now.", discard_failures));
    }
    text.push_str("\nCouldn't finish cancelling. Please press Cancel again.");
    text
}

pub const SEARCH_PROMPT: &str = "Please enter the article numbers to search for, separated by commas:";

pub const SEARCH_EXPECTS_TEXT: &str = "Enter the article numbers separated by commas.";

pub fn article_not_found(token: &str) -> String {
    format!("Article {} not found.", token)
}

pub fn no_photos_for_article(token: &str) -> String {
    format!("No photos for article {}.", token)
}

pub fn article_lookup_failed(token: &str) -> String {
    format!("Couldn't search for article {}. Please try again later.", token)
}

pub const SEARCH_FINISHED: &str = "Search finished.";

pub const SEARCH_CANCELLED: &str = "Search cancelled.";

pub const RETRY_PROMPT: &str = "Something went wrong. Please try again.";
