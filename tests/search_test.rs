use std::fs;
use std::thread;
use std::time::Duration;

use notemill::{SortBy, SortOrder, Vault, VaultConfig};
use tempfile::TempDir;

fn open_vault(dir: &TempDir) -> Vault {
    Vault::open(VaultConfig::new(dir.path())).unwrap()
}

fn titles(results: &[notemill::SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.title.as_str()).collect()
}

#[test]
fn title_sort_follows_the_callers_direction() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault.create("Alpha", "older note").unwrap();
    thread::sleep(Duration::from_millis(20));
    vault.create("Beta", "newer note").unwrap();

    let asc = vault
        .search("*", SortBy::Title, SortOrder::Asc, None)
        .unwrap();
    assert_eq!(titles(&asc), vec!["Alpha", "Beta"]);

    let desc = vault
        .search("*", SortBy::Title, SortOrder::Desc, None)
        .unwrap();
    assert_eq!(titles(&desc), vec!["Beta", "Alpha"]);
}

#[test]
fn recency_sort_follows_the_callers_direction() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault.create("Alpha", "older note").unwrap();
    thread::sleep(Duration::from_millis(20));
    vault.create("Beta", "newer note").unwrap();

    let newest_first = vault
        .search("*", SortBy::LastModified, SortOrder::Desc, None)
        .unwrap();
    assert_eq!(titles(&newest_first), vec!["Beta", "Alpha"]);

    let oldest_first = vault
        .search("*", SortBy::LastModified, SortOrder::Asc, None)
        .unwrap();
    assert_eq!(titles(&oldest_first), vec!["Alpha", "Beta"]);
}

#[test]
fn score_sort_asc_returns_the_lowest_scoring_match_first() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    // "Strong" matches repeatedly in a short body, "Weak" once in a long
    // one, so their relevance clearly differs.
    vault.create("Strong", "rust rust rust").unwrap();
    vault
        .create(
            "Weak",
            "rust mentioned once among many other words about gardening soil weather and tomatoes",
        )
        .unwrap();

    let desc = vault
        .search("rust", SortBy::Score, SortOrder::Desc, None)
        .unwrap();
    assert_eq!(titles(&desc), vec!["Strong", "Weak"]);
    assert!(desc[0].score.unwrap() > desc[1].score.unwrap());

    // Same caller-visible contract on the other direction: ascending on
    // the score axis means the weakest match leads.
    let asc = vault
        .search("rust", SortBy::Score, SortOrder::Asc, None)
        .unwrap();
    assert_eq!(titles(&asc), vec!["Weak", "Strong"]);
    assert!(asc[0].score.unwrap() < asc[1].score.unwrap());
}

#[test]
fn wildcard_returns_every_note_without_scores_or_highlights() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault.create("One", "alpha #tagged").unwrap();
    vault.create("Two", "beta").unwrap();
    vault.create("Three", "gamma").unwrap();

    let results = vault
        .search("*", SortBy::Score, SortOrder::Desc, None)
        .unwrap();
    assert_eq!(results.len(), 3);
    for result in &results {
        assert!(result.score.is_none());
        assert!(result.title_highlights.is_none());
        assert!(result.content_highlights.is_none());
        assert!(result.tag_matches.is_none());
    }
}

#[test]
fn limit_truncates_after_ordering() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault.create("Alpha", "a").unwrap();
    vault.create("Beta", "b").unwrap();
    vault.create("Gamma", "c").unwrap();

    let top_two = vault
        .search("*", SortBy::Title, SortOrder::Desc, Some(2))
        .unwrap();
    assert_eq!(titles(&top_two), vec!["Gamma", "Beta"]);
}

#[test]
fn unquoted_tag_shorthand_matches_via_tags() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault.create("Errands", "buy milk #todo").unwrap();
    vault.create("Journal", "wrote some words").unwrap();

    let results = vault
        .search("#todo", SortBy::Score, SortOrder::Desc, None)
        .unwrap();
    assert_eq!(titles(&results), vec!["Errands"]);
    assert_eq!(results[0].tag_matches.as_deref(), Some(&["todo".to_string()][..]));
    assert!(results[0].title_highlights.is_none());
    assert!(results[0].content_highlights.is_none());
}

#[test]
fn quoted_phrase_suppresses_tag_matching() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault.create("Errands", "buy milk #todo").unwrap();

    let results = vault
        .search("\"#todo\"", SortBy::Score, SortOrder::Desc, None)
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn content_matches_get_context_highlights_without_tags() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault
        .create("Grocery List", "Remember the milk and the eggs #shopping")
        .unwrap();

    let results = vault
        .search("milk", SortBy::Score, SortOrder::Desc, None)
        .unwrap();
    assert_eq!(results.len(), 1);
    let highlight = results[0].content_highlights.as_deref().unwrap();
    assert!(highlight.contains("<b>milk</b>"));
    assert!(!highlight.contains("#shopping"));
    assert!(results[0].title_highlights.is_none());
}

#[test]
fn title_matches_highlight_the_whole_title() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault
        .create("Grocery List", "Remember the milk and the eggs")
        .unwrap();

    let results = vault
        .search("grocery", SortBy::Score, SortOrder::Desc, None)
        .unwrap();
    assert_eq!(results.len(), 1);
    let highlight = results[0].title_highlights.as_deref().unwrap();
    assert!(highlight.contains("<b>Grocery</b>"));
    assert!(highlight.contains("List"));
    assert!(results[0].content_highlights.is_none());
}

#[test]
fn stemmed_and_folded_terms_match() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault.create("Cooking", "roasting peppers").unwrap();
    vault.create("Travel", "cafe visits in Paris").unwrap();

    // Stemming: "roast" matches "roasting".
    let results = vault
        .search("roast", SortBy::Score, SortOrder::Desc, None)
        .unwrap();
    assert_eq!(titles(&results), vec!["Cooking"]);

    // Accent folding: "café" matches "cafe".
    let results = vault
        .search("café", SortBy::Score, SortOrder::Desc, None)
        .unwrap();
    assert_eq!(titles(&results), vec!["Travel"]);
}

#[test]
fn date_range_expressions_filter_on_last_modified() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault.create("Recent", "fresh words").unwrap();

    let results = vault
        .search(
            "last_modified:[2000-01-01T00:00:00Z TO 2100-01-01T00:00:00Z]",
            SortBy::Score,
            SortOrder::Desc,
            None,
        )
        .unwrap();
    assert_eq!(titles(&results), vec!["Recent"]);

    let results = vault
        .search(
            "last_modified:[2000-01-01T00:00:00Z TO 2001-01-01T00:00:00Z]",
            SortBy::Score,
            SortOrder::Desc,
            None,
        )
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn external_edits_are_visible_without_reopening() {
    let dir = TempDir::new().unwrap();
    let vault = open_vault(&dir);
    vault.create("Existing", "original").unwrap();

    // Drop a file into the directory behind the vault's back; the sync
    // pass in front of the search picks it up.
    fs::write(dir.path().join("Dropped.md"), "sideloaded content").unwrap();

    let results = vault
        .search("sideloaded", SortBy::Score, SortOrder::Desc, None)
        .unwrap();
    assert_eq!(titles(&results), vec!["Dropped"]);
}
