//! Structure extraction over realistic modules.

use pretty_assertions::assert_eq;

use codescope::error::AnalyzerError;
use codescope::indexer::extract_structure;
use codescope::types::{ClassFact, FunctionFact};

fn func(name: &str, args: &[&str], line: u32) -> FunctionFact {
    FunctionFact {
        name: name.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        line,
    }
}

#[test]
fn realistic_module() {
    let code = r#"from __future__ import annotations

import os
import json as _json
from typing import Any, Optional
from .models import User


def load(path: str, *, strict: bool = False) -> dict[str, Any]:
    with open(path) as fh:
        return _json.load(fh)


@app.route("/users")
async def list_users(request, limit=10, *filters):
    import logging
    return []


class Repository:
    """Stores users."""

    def __init__(self, root):
        self.root = root

    @property
    def size(self):
        return 0

    async def fetch(self, user_id, /, cache=None):
        def inner():
            pass
        return inner

    class Meta:
        def describe(self):
            return "meta"
"#;
    let facts = extract_structure(code).unwrap();

    assert_eq!(
        facts.functions,
        vec![
            func("load", &["path"], 9),
            func("list_users", &["request", "limit"], 15),
        ]
    );

    assert_eq!(
        facts.classes,
        vec![
            ClassFact {
                name: "Repository".into(),
                methods: vec![
                    func("__init__", &["self", "root"], 23),
                    func("size", &["self"], 27),
                    func("fetch", &["self", "user_id", "cache"], 30),
                ],
                line: 20,
            },
            ClassFact {
                name: "Meta".into(),
                methods: vec![func("describe", &["self"], 36)],
                line: 35,
            },
        ]
    );

    assert_eq!(
        facts.imports,
        vec![
            "__future__.annotations",
            "os",
            "json",
            "typing.Any",
            "typing.Optional",
            ".models.User",
            "logging",
        ]
    );
}

#[test]
fn syntax_error_reports_location() {
    let err = extract_structure("class Broken:\n    def ok(self):\n        pass\n\nx = (1, 2\n")
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::Parse(_)));
    assert!(err.to_string().starts_with("syntax error at line"), "{err}");
}

#[test]
fn script_without_definitions() {
    let facts = extract_structure("print('hello')\nx = [i * i for i in range(10)]\n").unwrap();
    assert!(facts.functions.is_empty());
    assert!(facts.classes.is_empty());
    assert!(facts.imports.is_empty());
}
