use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

/// Tokens with fewer characters than this never become index terms.
pub const MIN_TOKEN_CHARS: usize = 3;

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"http\S+").expect("valid regex");
    static ref NON_WORD_RE: Regex = Regex::new(r"[^\p{L}\p{N}\s']+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// NFKC-normalize, lowercase, drop URLs and punctuation, collapse whitespace.
///
/// Apostrophes are kept inside words only, so contractions such as `don't`
/// still reach the stopword list intact.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.nfkc().collect::<String>().to_lowercase().replace('\u{2019}', "'");
    let without_urls = URL_RE.replace_all(&lowered, " ");
    let words_only = NON_WORD_RE.replace_all(&without_urls, " ");
    words_only
        .split_whitespace()
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split already-normalized text into raw tokens.
pub fn tokenize(normalized: &str) -> Vec<String> {
    normalized.split_whitespace().map(str::to_string).collect()
}

/// Map one normalized word to the term it is indexed under, if any.
pub fn term_for_word(word: &str) -> Option<String> {
    if word.chars().count() < MIN_TOKEN_CHARS || is_stopword(word) {
        return None;
    }
    Some(STEMMER.stem(word).into_owned())
}

/// Remove stopwords and short tokens, stemming the survivors.
pub fn filter_tokens(tokens: &[String]) -> Vec<String> {
    tokens.iter().filter_map(|t| term_for_word(t)).collect()
}

/// Full pipeline: normalize, tokenize, filter.
pub fn analyze(text: &str) -> Vec<String> {
    filter_tokens(&tokenize(&normalize_text(text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_analyze() {
        let t = analyze("Running, runner's run!");
        assert!(t.iter().any(|w| w == "run"));
    }

    #[test]
    fn normalize_strips_urls_and_punctuation() {
        let n = normalize_text("See https://example.com/x?y=1 -- NOW!!  ok");
        assert_eq!(n, "see now ok");
    }

    #[test]
    fn contractions_are_stopwords() {
        assert!(analyze("don't isn't").is_empty());
        assert!(analyze("Don\u{2019}t wasn't COULDN'T").is_empty());
        assert_eq!(analyze("Don't worry, it isn't what they're doing"), vec!["worri"]);
    }

    #[test]
    fn apostrophes_survive_only_inside_words() {
        assert_eq!(normalize_text("'Quoted' rock'n'roll ' don\u{2019}t"), "quoted rock'n'roll don't");
    }

    #[test]
    fn short_tokens_never_become_terms() {
        assert_eq!(term_for_word("go"), None);
        assert_eq!(term_for_word("the"), None);
        assert_eq!(term_for_word("rust").as_deref(), Some("rust"));
    }
}
