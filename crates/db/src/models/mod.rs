pub mod content_item;
