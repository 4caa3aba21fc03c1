//! Map import specifiers onto files kept in the graph.

use super::PyImport;

const PY_ROOTS: &[&str] = &["", "src/", "lib/", "app/"];
const JS_SUFFIXES: &[&str] = &["", ".js", ".ts", ".jsx", ".tsx", "/index.js", "/index.ts"];

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn join(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_owned()
    } else {
        format!("{dir}/{rest}")
    }
}

/// Collapse `.` and `..` segments; `None` when the path escapes the root.
pub(super) fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.join("/"))
}

pub(super) fn python_targets(importer: &str, import: &PyImport, kept: &[&str]) -> Vec<String> {
    let dir = parent_dir(importer);
    let (module, roots): (&str, Vec<String>) = match import {
        PyImport::Module(m) => (
            m,
            PY_ROOTS
                .iter()
                .map(|r| (*r).to_owned())
                .chain((!dir.is_empty()).then(|| format!("{dir}/")))
                .collect(),
        ),
        PyImport::Sibling(m) => (m, vec![join(dir, "")]),
    };

    let candidates: Vec<String> = roots
        .iter()
        .flat_map(|root| [format!("{root}{module}.py"), format!("{root}{module}/__init__.py")])
        .collect();
    candidates
        .into_iter()
        .find(|c| kept.contains(&c.as_str()))
        .into_iter()
        .collect()
}

pub(super) fn script_targets(importer: &str, spec: &str, kept: &[&str]) -> Vec<String> {
    if spec.starts_with('.') {
        let Some(base) = normalize(&join(parent_dir(importer), spec)) else {
            return Vec::new();
        };
        return JS_SUFFIXES
            .iter()
            .map(|suffix| format!("{base}{suffix}"))
            .find(|c| kept.contains(&c.as_str()))
            .into_iter()
            .collect();
    }

    let bare_js = format!("{spec}.js");
    let bare_ts = format!("{spec}.ts");
    let nested_js = format!("/{bare_js}");
    let nested_ts = format!("/{bare_ts}");
    kept.iter()
        .filter(|p| {
            **p == bare_js || **p == bare_ts || p.ends_with(&nested_js) || p.ends_with(&nested_ts)
        })
        .map(|p| (*p).to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_segments() {
        assert_eq!(normalize("web/./lib/../api").as_deref(), Some("web/api"));
        assert_eq!(normalize("../outside"), None);
    }

    #[test]
    fn python_module_under_src() {
        let kept = ["src/app.py", "src/utils/__init__.py"];
        assert_eq!(
            python_targets("src/app.py", &PyImport::Module("utils".into()), &kept),
            ["src/utils/__init__.py"]
        );
    }

    #[test]
    fn python_module_beside_importer() {
        let kept = ["tools/run.py", "tools/helpers.py"];
        assert_eq!(
            python_targets("tools/run.py", &PyImport::Module("helpers".into()), &kept),
            ["tools/helpers.py"]
        );
    }

    #[test]
    fn python_sibling_only_looks_in_own_dir() {
        let kept = ["pkg/a.py", "models.py"];
        assert!(python_targets("pkg/a.py", &PyImport::Sibling("models".into()), &kept).is_empty());
        let kept = ["pkg/a.py", "pkg/models.py"];
        assert_eq!(
            python_targets("pkg/a.py", &PyImport::Sibling("models".into()), &kept),
            ["pkg/models.py"]
        );
    }

    #[test]
    fn python_stdlib_does_not_resolve() {
        let kept = ["app.py"];
        assert!(python_targets("app.py", &PyImport::Module("os".into()), &kept).is_empty());
    }

    #[test]
    fn script_relative_with_index() {
        let kept = ["web/app.js", "web/components/index.ts"];
        assert_eq!(
            script_targets("web/app.js", "./components", &kept),
            ["web/components/index.ts"]
        );
    }

    #[test]
    fn script_parent_relative() {
        let kept = ["web/pages/home.js", "web/api.js"];
        assert_eq!(script_targets("web/pages/home.js", "../api", &kept), ["web/api.js"]);
    }

    #[test]
    fn script_bare_name_matches_file_suffix() {
        let kept = ["web/app.js", "lib/store.ts", "mystore.ts"];
        assert_eq!(script_targets("web/app.js", "store", &kept), ["lib/store.ts"]);
    }
}
