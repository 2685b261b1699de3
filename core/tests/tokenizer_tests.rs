use linkrank_core::tokenizer::{analyze, normalize_text, tokenize};

#[test]
fn it_normalizes_and_stems() {
    let words = analyze("Running Runners RUN! The café's menu.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // accented letters survive normalization
    assert!(words.iter().any(|w| w.starts_with("café")));
}

#[test]
fn it_filters_stopwords_and_short_tokens() {
    let words = analyze("The quick brown fox and the lazy dog is ok");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert!(!words.contains(&"ok".to_string()));
    assert!(words.contains(&"fox".to_string()));
}

#[test]
fn raw_tokens_keep_everything() {
    let toks = tokenize(&normalize_text("The quick, brown fox!"));
    assert_eq!(toks, vec!["the", "quick", "brown", "fox"]);
}
