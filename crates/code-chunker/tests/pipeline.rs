use semantic_code_chunker::text::is_balanced;
use semantic_code_chunker::{
    Chunk, ChunkerConfig, CodeParser, DenoisePreprocessor, FrameworkPack, FrameworkPatternMatcher,
    Language, SemanticChunkingEngine, SemanticType, SemanticUnitExtractor, SourceDocument,
    SplittingMethod,
};
use std::time::Instant;

const FASTIFY_ROUTES: &str = r#"'use strict';

const db = require('./db');
const { validate } = require('./schema');

/**
 * User routes.
 */
module.exports = async function userRoutes(fastify, opts) {
  fastify.addHook('onRequest', async (request) => {
    request.log.info('incoming');
  });

  // List users
  fastify.get('/users', async (request, reply) => {
    const users = await db.list();
    return users;
  });

  fastify.post('/users', async (request, reply) => {
    validate(request.body);
    const user = await db.insert(request.body);
    reply.code(201);
    return user;
  });

  function toDto(user) {
    return { id: user.id, name: user.name };
  }
};
"#;

const ESM_SERVICE: &str = r#"import { db } from './db';
import { hash } from './crypto';
import express from 'express';

export async function createUser(input) {
  const password = await hash(input.password);
  return db.insert({ ...input, password });
}

export async function findUser(id) {
  return db.find(id);
}
"#;

fn engine(config: ChunkerConfig) -> SemanticChunkingEngine {
    SemanticChunkingEngine::with_tokenizer(config, None).expect("valid config")
}

fn config(max_tokens: usize, min_tokens: usize) -> ChunkerConfig {
    ChunkerConfig {
        max_tokens,
        min_tokens,
        overlap_tokens: 8,
        ..ChunkerConfig::default()
    }
}

fn fastify_config(max_tokens: usize, min_tokens: usize) -> ChunkerConfig {
    ChunkerConfig {
        framework_packs: vec![FrameworkPack::Fastify],
        ..config(max_tokens, min_tokens)
    }
}

fn assert_within_budget(chunks: &[Chunk], max_tokens: usize) {
    for chunk in chunks.iter().filter(|chunk| !chunk.metadata.is_atomic) {
        assert!(
            chunk.metadata.token_count <= max_tokens,
            "chunk {} has {} tokens (max {max_tokens}):\n{}",
            chunk.metadata.chunk_index,
            chunk.metadata.token_count,
            chunk.content
        );
    }
}

fn big_class(methods: usize) -> String {
    let body: String = (0..methods)
        .map(|i| {
            format!("  method{i}(value) {{\n    const doubled = value * {i};\n    return doubled + {i};\n  }}\n\n")
        })
        .collect();
    format!("class Service {{\n{body}}}\n")
}

#[test]
fn two_small_units_share_one_chunk() {
    let mut source = String::from("function sum(items) {\n  let total = 0;\n");
    for i in 0..16 {
        source.push_str(&format!("  total += items[{i}];\n"));
    }
    source.push_str("  return total;\n}\n\nclass Counter {\n  constructor() {\n    this.count = 0;\n  }\n");
    for i in 0..25 {
        source.push_str(&format!("  m{i}() {{}}\n"));
    }
    source.push_str("}\n");

    let chunks = engine(config(512, 200)).split(&SourceDocument::new(source, "scenario_a.js"));

    assert_eq!(chunks.len(), 1);
    let chunk = &chunks[0];
    assert_eq!(chunk.metadata.function_names, vec!["sum"]);
    assert_eq!(chunk.metadata.class_names, vec!["Counter"]);
    assert_eq!(chunk.metadata.semantic_type, SemanticType::Mixed);
    assert_eq!(chunk.metadata.splitting_method, SplittingMethod::Semantic);
}

#[test]
fn oversized_class_splits_into_method_chunks() {
    let source = big_class(16);
    let engine = engine(config(120, 40));
    assert!(engine.counter().count(&source) > 3 * 120);

    let chunks = engine.split(&SourceDocument::new(source.clone(), "service.js"));

    assert!(chunks.len() >= 3);
    assert_within_budget(&chunks, 120);
    for chunk in &chunks {
        assert_eq!(chunk.metadata.splitting_method, SplittingMethod::Resegment);
        assert_eq!(chunk.metadata.parent_scope.as_deref(), Some("Service"));
        assert_eq!(chunk.metadata.semantic_type, SemanticType::Method);
        assert_eq!(chunk.metadata.split_total, Some(chunks.len()));
        assert!(!chunk.metadata.function_names.is_empty());
    }
    for chunk in &chunks[1..chunks.len() - 1] {
        assert!(is_balanced(&chunk.content), "unbalanced middle part:\n{}", chunk.content);
    }
    let joined: String = chunks.iter().map(|chunk| chunk.content.as_str()).collect();
    assert_eq!(joined, source.trim_end());
}

#[test]
fn corrupt_input_falls_back_to_token_windows() {
    let source = "}}} ))) <<< %%% ((( [[[ \n".repeat(80);
    let chunks = engine(config(40, 10)).split(&SourceDocument::new(source, "broken.ts"));

    assert!(!chunks.is_empty());
    assert_within_budget(&chunks, 40);
    assert!(chunks
        .iter()
        .all(|chunk| chunk.metadata.splitting_method == SplittingMethod::TokenWindow));
}

#[test]
fn braces_in_strings_do_not_unbalance_chunks() {
    let source = r#"const t = "use {curly} in string"; function f(){ return 1; }"#;
    assert!(is_balanced(source));

    let chunks = engine(ChunkerConfig::default()).split(&SourceDocument::new(source, "d.js"));
    assert_eq!(chunks.len(), 1);
    assert!(is_balanced(&chunks[0].content));
    assert_eq!(chunks[0].metadata.function_names, vec!["f"]);
}

#[test]
fn framework_routes_are_atomic_chunks() {
    let chunks = engine(fastify_config(512, 64)).split(&SourceDocument::new(FASTIFY_ROUTES, "routes/users.js"));

    let routes: Vec<&Chunk> = chunks.iter().filter(|chunk| chunk.metadata.is_atomic).collect();
    assert_eq!(routes.len(), 2);
    assert!(routes[0].content.contains("fastify.get('/users'"));
    assert!(routes[1].content.contains("fastify.post('/users'"));
    for route in &routes {
        assert_eq!(route.metadata.semantic_type, SemanticType::FrameworkCall);
        assert_eq!(route.content.matches("fastify.").count(), 1);
    }
    assert!(chunks.iter().any(|chunk| chunk.metadata.function_names == vec!["toDto"]));
}

#[test]
fn atomic_routes_may_exceed_the_budget() {
    let handler: String = (0..40)
        .map(|i| format!("    const step{i} = await db.step({i}, request.body);\n"))
        .collect();
    let source = format!(
        "module.exports = async function (fastify) {{\n  fastify.put('/jobs/:id', async (request) => {{\n{handler}    return step0;\n  }});\n\n  function small() {{\n    return 1;\n  }}\n}};\n"
    );
    let chunks = engine(fastify_config(60, 10)).split(&SourceDocument::new(source, "jobs.js"));

    let route = chunks
        .iter()
        .find(|chunk| chunk.metadata.is_atomic)
        .expect("route chunk");
    assert!(route.metadata.token_count > 60);
    assert!(route.metadata.split_part.is_none());
    assert!(route.content.contains("step39"));
    assert_within_budget(&chunks, 60);
}

#[test]
fn every_unit_is_covered_by_some_chunk() {
    let engine = engine(fastify_config(512, 64));
    let chunks = engine.split(&SourceDocument::new(FASTIFY_ROUTES, "routes/users.js"));

    let matcher = FrameworkPatternMatcher::new(&[], &[FrameworkPack::Fastify]).unwrap();
    let parsed = CodeParser::new(Language::from_path("routes/users.js"))
        .parse(FASTIFY_ROUTES)
        .unwrap();
    let extraction = SemanticUnitExtractor::new(&matcher, engine.counter()).extract(&parsed);

    assert_eq!(extraction.units.len(), 4);
    assert_eq!(extraction.imports.len(), 2);
    for unit in &extraction.units {
        let needle = unit.content.trim();
        assert!(
            chunks.iter().any(|chunk| chunk.content.contains(needle)),
            "unit {} not covered",
            unit.name
        );
    }
}

#[test]
fn referenced_imports_are_restored() {
    let chunks = engine(ChunkerConfig::default()).split(&SourceDocument::new(ESM_SERVICE, "users.ts"));

    assert_eq!(chunks.len(), 1);
    let chunk = &chunks[0];
    assert!(chunk.content.starts_with("import { db } from './db';\nimport { hash } from './crypto';"));
    assert!(!chunk.content.contains("express"));
    assert_eq!(chunk.metadata.injected_imports, 2);
    assert!(chunk.metadata.has_imports);
    assert!(chunk.metadata.has_exports);
    assert_eq!(chunk.metadata.function_names, vec!["createUser", "findUser"]);
    assert_eq!(chunk.metadata.semantic_type, SemanticType::Export);
}

#[test]
fn import_restore_can_be_disabled() {
    let config = ChunkerConfig {
        include_imports_in_context: false,
        ..ChunkerConfig::default()
    };
    let chunks = engine(config).split(&SourceDocument::new(ESM_SERVICE, "users.ts"));
    assert!(chunks.iter().all(|chunk| chunk.metadata.injected_imports == 0));
    assert!(chunks.iter().all(|chunk| !chunk.content.contains("import ")));
}

#[test]
fn splitting_is_deterministic() {
    let engine = engine(fastify_config(80, 20));
    let source = format!("{FASTIFY_ROUTES}\n{}", big_class(10));
    let document = SourceDocument::new(source, "mixed.js");
    assert_eq!(engine.split(&document), engine.split(&document));
}

#[test]
fn engine_is_shared_across_threads() {
    let engine = engine(config(100, 20));
    let document = SourceDocument::new(big_class(12), "service.js");
    let expected = engine.split(&document);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| engine.split(&document))).collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn expired_deadline_uses_token_windows() {
    let engine = engine(config(100, 20));
    let chunks = engine.split_until(&SourceDocument::new(big_class(12), "service.js"), Instant::now());

    assert!(chunks.len() > 1);
    assert_within_budget(&chunks, 100);
    assert!(chunks
        .iter()
        .all(|chunk| chunk.metadata.splitting_method == SplittingMethod::TokenWindow));
}

#[test]
fn preprocessor_runs_before_parsing() {
    let source = "function f(x) {\n  console.log('debug', x);\n  return x * 2;\n}\n";
    let engine = engine(ChunkerConfig::default()).with_preprocessor(DenoisePreprocessor::default());
    let chunks = engine.split(&SourceDocument::new(source, "f.js"));
    assert_eq!(chunks.len(), 1);
    assert!(!chunks[0].content.contains("console.log"));
}

#[test]
fn document_metadata_passes_through() {
    let document: SourceDocument = serde_json::from_str(
        r#"{"pageContent":"export function ping() { return 'pong'; }","source":"src/ping.js","metadata":{"repo":"demo","commit":"abc123"}}"#,
    )
    .unwrap();
    let chunks = engine(ChunkerConfig::default()).split(&document);

    assert_eq!(chunks.len(), 1);
    let metadata = &chunks[0].metadata;
    assert_eq!(metadata.source_path, "src/ping.js");
    assert_eq!(metadata.extra["repo"], "demo");
    assert_eq!(metadata.extra["commit"], "abc123");

    let json = serde_json::to_value(&chunks[0]).unwrap();
    assert_eq!(json["metadata"]["splitting_method"], "semantic");
    assert!(json["metadata"].get("split_part").is_none());
}

#[test]
fn bpe_counts_match_metadata() {
    let engine = SemanticChunkingEngine::new(fastify_config(64, 16)).expect("valid config");
    assert!(engine.counter().has_tokenizer());

    let source = format!("{FASTIFY_ROUTES}\n{ESM_SERVICE}");
    let chunks = engine.split(&SourceDocument::new(source, "combined.ts"));

    assert!(!chunks.is_empty());
    assert_within_budget(&chunks, 64);
    for chunk in &chunks {
        assert_eq!(chunk.metadata.token_count, engine.counter().count(&chunk.content));
    }
}

#[test]
fn factory_body_declarations_get_their_requires() {
    let source = "const db = require('./db');\n\nmodule.exports = async function routes(fastify) {\n  fastify.get('/items', async () => db.list());\n\n  function load(id) {\n    return db.find(id);\n  }\n};\n";
    let chunks = engine(fastify_config(512, 0)).split(&SourceDocument::new(source, "routes.js"));

    let load = chunks
        .iter()
        .find(|chunk| chunk.content.contains("function load"))
        .expect("load chunk");
    assert!(load.content.starts_with("const db = require('./db');\n"));
    assert_eq!(load.metadata.injected_imports, 1);
    assert!(load.metadata.has_imports);

    let route = chunks
        .iter()
        .find(|chunk| chunk.metadata.is_atomic)
        .expect("route chunk");
    assert_eq!(route.metadata.injected_imports, 0);
    assert!(!route.content.contains("require("));
}

#[test]
fn split_tags_survive_duplicate_removal() {
    let mut source = String::from("function big() {\n");
    for _ in 0..60 {
        source.push_str("  tick();\n");
    }
    source.push_str("}\n");
    let config = ChunkerConfig {
        max_tokens: 40,
        min_tokens: 0,
        overlap_tokens: 0,
        ..ChunkerConfig::default()
    };
    let chunks = engine(config).split(&SourceDocument::new(source, "big.js"));

    let mut idx = 0;
    while idx < chunks.len() {
        let Some(total) = chunks[idx].metadata.split_total else {
            idx += 1;
            continue;
        };
        assert!(total > 1);
        for part in 1..=total {
            let chunk = &chunks[idx + part - 1];
            assert_eq!(chunk.metadata.split_part, Some(part));
            assert_eq!(chunk.metadata.split_total, Some(total));
        }
        idx += total;
    }
}
