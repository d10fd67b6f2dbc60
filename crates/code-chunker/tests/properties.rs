use proptest::prelude::*;
use semantic_code_chunker::text::is_balanced;
use semantic_code_chunker::{ChunkerConfig, SemanticChunkingEngine, SourceDocument, TokenCounter};

fn separators() -> Vec<String> {
    ChunkerConfig::default().window_separators
}

fn function_source(names: &[(String, usize)]) -> String {
    names
        .iter()
        .enumerate()
        .map(|(idx, (name, lines))| {
            let body: String = (0..*lines)
                .map(|line| format!("  const v{line} = {name}_{idx}({line});\n"))
                .collect();
            format!("function {name}{idx}(input) {{\n{body}  return input;\n}}\n\n")
        })
        .collect()
}

proptest! {
    #[test]
    fn proptest_overlap_is_a_short_suffix(text in "[a-z {}();\n]{0,300}", k in 0usize..24) {
        let counter = TokenCounter::heuristic(0, 64);
        let overlap = counter.extract_overlap(&text, k);
        prop_assert!(text.ends_with(overlap));
        prop_assert!(counter.count(overlap) <= k);
    }

    #[test]
    fn proptest_window_is_a_fitting_prefix(text in "[a-z {}();\n]{1,400}", max in 1usize..64) {
        let counter = TokenCounter::heuristic(0, max);
        let window = counter.extract_window(&text, max, &separators());
        prop_assert!(!window.is_empty());
        prop_assert!(text.starts_with(window));
        prop_assert!(counter.count(window) <= max);
    }

    #[test]
    fn proptest_count_is_deterministic(text in "\\PC{0,200}") {
        let counter = TokenCounter::heuristic(0, 64);
        prop_assert_eq!(counter.count(&text), counter.count(&text));
    }

    #[test]
    fn proptest_brackets_in_strings_stay_balanced(inner in "[a-z{}()\\[\\] ]{0,30}") {
        let code = format!("const s = \"{inner}\"; const t = '{inner}'; function f() {{ return [s, t]; }}");
        prop_assert!(is_balanced(&code));
    }

    #[test]
    fn proptest_pipeline_respects_budget(
        functions in prop::collection::vec(("[a-z]{3,8}", 1usize..40), 1..10),
        max in 48usize..200,
    ) {
        let config = ChunkerConfig {
            max_tokens: max,
            min_tokens: max / 4,
            overlap_tokens: 8,
            ..ChunkerConfig::default()
        };
        let engine = SemanticChunkingEngine::with_tokenizer(config, None).unwrap();
        let document = SourceDocument::new(function_source(&functions), "generated.js");

        let chunks = engine.split(&document);
        prop_assert!(!chunks.is_empty());
        for chunk in &chunks {
            prop_assert!(chunk.metadata.token_count <= max);
        }
        prop_assert_eq!(chunks, engine.split(&document));
    }
}
