use barangay_board::moderation::{WordFilter, parse_word_list};
use std::path::Path;

#[test]
fn test_default_filter_flags_whole_word() {
    let filter = WordFilter::with_default_words();
    assert!(filter.is_inappropriate("this is a badword"));
    assert!(filter.is_inappropriate("BadWord, honestly."));
}

#[test]
fn test_substrings_are_not_flagged() {
    let filter = WordFilter::with_default_words();
    assert!(!filter.is_inappropriate("badwording"));
    assert!(!filter.is_inappropriate("nobadword"));

    let filter = WordFilter::new(["ass"]);
    assert!(!filter.is_inappropriate("first class service"));
    assert!(!filter.is_inappropriate("pass the salt"));
    assert!(filter.is_inappropriate("what an ass"));
}

#[test]
fn test_words_are_escaped() {
    let filter = WordFilter::new(["a.b"]);
    assert!(filter.is_inappropriate("a.b"));
    assert!(!filter.is_inappropriate("axb"));
}

#[test]
fn test_symbol_edged_words_are_flagged() {
    let filter = WordFilter::new(["a$$", "$hit"]);
    assert!(filter.is_inappropriate("you are an a$$"));
    assert!(filter.is_inappropriate("what $hit is this"));
    assert!(filter.is_inappropriate("A$$!"));
    assert!(!filter.is_inappropriate("what$hit"));
    assert!(!filter.is_inappropriate("a$$ets"));
}

#[test]
fn test_empty_filter_never_flags() {
    let filter = WordFilter::new(Vec::<String>::new());
    assert!(filter.is_empty());
    assert_eq!(filter.len(), 0);
    assert!(!filter.is_inappropriate("badword"));

    let blanks = WordFilter::new(["", "   "]);
    assert!(blanks.is_empty());
}

#[test]
fn test_missing_word_file_degrades_to_empty() {
    let filter = WordFilter::load(Some(Path::new("/nonexistent/barangay/words.txt")));
    assert!(filter.is_empty());
    assert!(!filter.is_inappropriate("badword"));
}

#[test]
fn test_load_without_path_uses_defaults() {
    let filter = WordFilter::load(None);
    assert_eq!(filter.len(), 1);
    assert!(filter.is_inappropriate("badword"));
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("barangay-words-{}.txt", std::process::id()));
    std::fs::write(&path, "# profanity\nfoo\n\n  Bar  \n").unwrap();

    let filter = WordFilter::load(Some(path.as_path()));
    std::fs::remove_file(&path).ok();

    assert_eq!(filter.len(), 2);
    assert!(filter.is_inappropriate("FOO"));
    assert!(filter.is_inappropriate("a bar fight"));
    assert!(!filter.is_inappropriate("profanity"));
}

#[test]
fn test_parse_word_list_skips_comments() {
    let words = parse_word_list("# header\nalpha\n\n   \n# beta\ngamma\n");
    assert_eq!(words, vec!["alpha", "gamma"]);
}
