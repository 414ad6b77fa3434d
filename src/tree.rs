//! Hierarchical test case tree and case selection
//!
//! Cases live in named groups forming a tree. A case is addressed by its
//! full dot-separated path (e.g. `vkcts.query_pool.occlusion.basic`).
//! Enumeration is depth first in insertion order, so listing and execution
//! order are deterministic.

use crate::case::TestCase;

/// Child of a [`TestCaseGroup`]
pub enum TestNode {
    Group(TestCaseGroup),
    Case(Box<dyn TestCase>),
}

impl TestNode {
    pub fn name(&self) -> &str {
        match self {
            TestNode::Group(group) => group.name(),
            TestNode::Case(case) => case.name(),
        }
    }
}

/// Named collection of cases and subgroups
pub struct TestCaseGroup {
    i_name: String,
    i_description: String,
    i_children: Vec<TestNode>,
}

impl TestCaseGroup {
    /// Panics on a malformed name: lowercase alphanumerics,
    /// `_` and `-` only, dots are reserved as the path separator
    pub fn new(name: &str, description: &str) -> TestCaseGroup {
        assert!(is_valid_name(name), "invalid test group name: {:?}", name);

        TestCaseGroup {
            i_name: name.to_string(),
            i_description: description.to_string(),
            i_children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.i_name
    }

    pub fn description(&self) -> &str {
        &self.i_description
    }

    /// Panics on a duplicate child name
    pub fn add_group(&mut self, group: TestCaseGroup) {
        self.assert_unique(group.name());

        self.i_children.push(TestNode::Group(group));
    }

    /// Panics on a malformed or duplicate case name
    pub fn add_case(&mut self, case: Box<dyn TestCase>) {
        assert!(
            is_valid_name(case.name()),
            "invalid test case name: {:?}",
            case.name()
        );
        self.assert_unique(case.name());

        self.i_children.push(TestNode::Case(case));
    }

    fn assert_unique(&self, name: &str) {
        assert!(
            self.i_children.iter().all(|child| child.name() != name),
            "duplicate test node name: {}.{}",
            self.i_name,
            name
        );
    }

    pub fn children(&self) -> impl Iterator<Item = &TestNode> {
        self.i_children.iter()
    }

    /// Full path and reference for every case under this group,
    /// depth first in insertion order
    pub fn cases(&self) -> Vec<(String, &dyn TestCase)> {
        let mut out = Vec::new();
        self.walk_cases("", &mut out);
        out
    }

    fn walk_cases<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a dyn TestCase)>) {
        let own = join_path(prefix, &self.i_name);

        for child in &self.i_children {
            match child {
                TestNode::Group(group) => group.walk_cases(&own, out),
                TestNode::Case(case) => {
                    out.push((join_path(&own, case.name()), case.as_ref()))
                }
            }
        }
    }

    /// Full path of every case under this group
    pub fn case_paths(&self) -> Vec<String> {
        self.cases().into_iter().map(|(path, _)| path).collect()
    }

    /// `(path, is_group)` for every node, parents before children
    pub fn entries(&self) -> Vec<(String, bool)> {
        let mut out = Vec::new();
        self.walk_entries("", &mut out);
        out
    }

    fn walk_entries(&self, prefix: &str, out: &mut Vec<(String, bool)>) {
        let own = join_path(prefix, &self.i_name);

        out.push((own.clone(), true));

        for child in &self.i_children {
            match child {
                TestNode::Group(group) => group.walk_entries(&own, out),
                TestNode::Case(case) => {
                    out.push((join_path(&own, case.name()), false))
                }
            }
        }
    }

    /// Case with the exact full path
    pub fn find(&self, path: &str) -> Option<&dyn TestCase> {
        self.cases()
            .into_iter()
            .find(|(p, _)| p == path)
            .map(|(_, case)| case)
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Shell-style `*` wildcard match over a full case path
///
/// `*` matches any characters including dots, so `vkcts.*`
/// covers the whole tree
pub fn matches_pattern(pattern: &str, path: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = path.chars().collect();

    let mut p = 0;
    let mut t = 0;
    let mut star: Option<usize> = None;
    let mut star_t = 0;

    while t < text.len() {
        if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if p < pat.len() && pat[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some(sp) = star {
            // Backtrack: let the last star swallow one more character
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }

    p == pat.len()
}

/// True when any of the patterns matches
pub fn matches_any(patterns: &[String], path: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| matches_pattern(pattern, path))
}
