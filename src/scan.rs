use std::path::PathBuf;

use serde::Serialize;

use crate::project::TargetProject;
use crate::source::{GeneratedSource, SourceKind};

/// High-level overview of a project as genrepair sees it.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectOverview {
    /// Project root.
    pub root: PathBuf,

    /// Number of files that may be repaired.
    pub product_files: usize,

    /// Number of files that only judge repairs.
    pub test_files: usize,

    /// Total lines across product files.
    pub product_lines: u32,

    /// Total lines across test files.
    pub test_lines: usize,

    /// Statements found in method, constructor and initializer bodies.
    pub statements: usize,

    /// Statements that can be edited or copied as donors.
    pub eligible_statements: usize,
}

impl ProjectOverview {
    pub fn from_source(project: &TargetProject, source: &GeneratedSource) -> Self {
        let asts: Vec<_> = source.product_asts().collect();
        let test_lines = source
            .files()
            .filter(|f| f.kind == SourceKind::Test)
            .map(|f| f.text().lines().count())
            .sum();

        ProjectOverview {
            root: project.root.clone(),
            product_files: project.product_files.len(),
            test_files: project.test_files.len(),
            product_lines: asts.iter().map(|a| a.line_count()).sum(),
            test_lines,
            statements: asts.iter().map(|a| a.walk().len()).sum(),
            eligible_statements: asts.iter().map(|a| a.locations().len()).sum(),
        }
    }
}

/// Parse every file of `project` and summarize it.
pub fn scan_project(project: &TargetProject) -> anyhow::Result<ProjectOverview> {
    let source = project.load_initial_source()?;
    Ok(ProjectOverview::from_source(project, &source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::project::tests::write;
    use tempfile::TempDir;

    #[test]
    fn scan_small_project() {
        let td = TempDir::new().unwrap();
        write(
            td.path(),
            "src/main/java/a/B.java",
            "package a;\nclass B {\n  int f(int x) {\n    if (x > 0) {\n      x--;\n    }\n    return x;\n  }\n}\n",
        );
        write(
            td.path(),
            "src/test/java/a/BTest.java",
            "package a;\nclass BTest {\n}\n",
        );

        let project = TargetProject::from_options(&Options::new(td.path().to_path_buf())).unwrap();
        let mut overview = scan_project(&project).expect("scan_project should succeed");
        overview.root = PathBuf::from("project");

        insta::assert_debug_snapshot!(overview, @r#"
        ProjectOverview {
            root: "project",
            product_files: 1,
            test_files: 1,
            product_lines: 9,
            test_lines: 3,
            statements: 5,
            eligible_statements: 3,
        }
        "#);
    }
}
