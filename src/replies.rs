//! Builds outgoing payloads: photo replies, fallback texts, kaomoji, and
//! inline result sets.

use rand::Rng;
use rand::seq::SliceRandom;
use teloxide::types::{InlineQueryResult, InlineQueryResultPhoto};
use url::Url;

use crate::config::{Category, Config};
use crate::pictures;

const KAOMOJI: [&str; 22] = [
    "^.^",
    "^_^",
    "ฅ(＾・ω・＾ฅ)",
    "(=^･ω･^=)",
    "/ᐠ. ᴗ.ᐟ\\",
    "/ᐠܻ    ᳕⑅ܻ ᐟ\\ﾉ",
    " —ฅ/ᐠ. ̫ .ᐟ\\ฅ —",
    "ฅ^•ﻌ•^ฅ",
    "^•^",
    "U^ｪ^U",
    "/ᐠ｡ꞈ｡ᐟ\\",
    "(=^･ｪ･^=)",
    "(^._.^)ﾉ",
    "=＾● ⋏ ●＾=",
    "(̷ ̷₌̷ ̷ㅇ̷ ̷ᆽ̷ ̷ㅇ̷ ̷₌̷ ̷)♡",
    "(=^‥^=)",
    "＼(=^‥^)/’` |",
    "(=^･ｪ･^=))ﾉ彡☆",
    "(^=◕ᴥ◕=^)",
    "ヽ(^‥^=ゞ)",
    "(^=˃ᆺ˂)",
    "ि०॰͡०ी",
];

pub fn kaomoji<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    KAOMOJI.choose(rng).copied().unwrap_or("^.^")
}

/// Caption for a picture: uniform over the category's captions, or the
/// implicit empty caption when none are configured.
pub fn pick_caption<'a, R: Rng + ?Sized>(category: &'a Category, rng: &mut R) -> &'a str {
    category.captions.choose(rng).map(String::as_str).unwrap_or("")
}

pub fn no_pictures_text(category_name: &str) -> String {
    format!("No pictures of {category_name} saved yet :(")
}

/// Resolve `<category>/<file>` against the storage base URL.
///
/// The base is treated as a directory whether or not it was written with a
/// trailing slash, so both forms address the same picture.
pub fn picture_url(base: &Url, category_name: &str, file_name: &str) -> Option<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("{category_name}/{file_name}")).ok()
}

/// One inline photo result per category that currently has pictures.
///
/// Every category is offered, hidden or not; empty ones are skipped silently.
pub async fn inline_results(config: &Config) -> Vec<InlineQueryResult> {
    let mut results = Vec::new();
    for (name, category) in config.categories.iter() {
        let Some(pic) = pictures::random_picture(&config.storage, name).await else {
            continue;
        };
        let Some(url) = picture_url(&config.storage.url, name, &pic) else {
            continue;
        };
        let caption = {
            let mut rng = rand::thread_rng();
            pick_caption(category, &mut rng).to_owned()
        };
        let mut photo = InlineQueryResultPhoto::new(format!("{name}/{pic}"), url.clone(), url);
        photo.caption = Some(caption);
        results.push(InlineQueryResult::Photo(photo));
    }
    results
}
