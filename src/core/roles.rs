// src/core/roles.rs
use std::path::Path;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::Result;
use super::model::{Role, RoleAssignment, RoleEntry};
use super::source::{java_files, SourceReader};

const ACTIVE_ROLES: [Role; 3] = [Role::EntryPoint, Role::Component, Role::DataAccess];

const ANNOTATIONS: [(Role, &[&str]); 3] = [
    (Role::EntryPoint, &["RestController", "Controller", "WebServlet", "Path"]),
    (Role::Component, &["Service", "Stateless", "Stateful", "Singleton", "Component"]),
    (Role::DataAccess, &["Repository"]),
];

const MARKERS: [(Role, &str); 3] = [
    (Role::EntryPoint, r"\bextends\s+HttpServlet\b"),
    (Role::Component, r"\bimplements\s+(?:[\w.<>]+\s*,\s*)*(?:SessionBean|EntityBean|MessageDrivenBean)\b"),
    (Role::DataAccess, r"\bEntityManager\b"),
];

const PATH_KEYWORDS: [(Role, &[&str]); 3] = [
    (Role::EntryPoint, &["controller"]),
    (Role::Component, &["service"]),
    (Role::DataAccess, &["repository", "dao"]),
];

const FILE_SUFFIXES: [(Role, &[&str]); 3] = [
    (Role::EntryPoint, &["Controller", "Resource", "Endpoint", "Servlet", "Action"]),
    (Role::Component, &["Service", "ServiceImpl", "Manager", "Facade", "Bean"]),
    (Role::DataAccess, &["Repository", "RepositoryImpl", "Dao", "DaoImpl"]),
];

/// Assigns each source file's class an architectural role
pub struct RoleClassifier {
    reader: SourceReader,
    annotations: Vec<(Role, Regex)>,
    markers: Vec<(Role, Regex)>,
}

impl RoleClassifier {
    pub fn new() -> Result<Self> {
        let annotations = ANNOTATIONS
            .iter()
            .map(|(role, names)| -> Result<(Role, Regex)> {
                let pattern = format!(r"@(?:{})\b", names.join("|"));
                Ok((*role, Regex::new(&pattern)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let markers = MARKERS
            .iter()
            .map(|(role, pattern)| -> Result<(Role, Regex)> { Ok((*role, Regex::new(pattern)?)) })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            reader: SourceReader::new()?,
            annotations,
            markers,
        })
    }

    /// Role of one file: annotations, then marker types, then path keywords,
    /// then file-name suffixes. `path` is matched for keywords as given.
    pub fn classify(&self, path: &Path, normalized: &str) -> Role {
        if let Some((role, _)) = self.annotations.iter().find(|(_, re)| re.is_match(normalized)) {
            return *role;
        }

        if let Some((role, _)) = self.markers.iter().find(|(_, re)| re.is_match(normalized)) {
            return *role;
        }

        let lowered = path.to_string_lossy().to_lowercase();
        if let Some((role, _)) = PATH_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        {
            return *role;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        FILE_SUFFIXES
            .iter()
            .find(|(_, suffixes)| suffixes.iter().any(|s| stem.ends_with(s)))
            .map(|(role, _)| *role)
            .unwrap_or(Role::Unclassified)
    }

    /// Classify every source file under `source_dir`. Unreadable files and files
    /// without a type declaration are skipped.
    pub fn classify_module(&self, source_dir: &Path) -> RoleAssignment {
        let mut assignment = RoleAssignment::new();

        for file in java_files(source_dir) {
            let normalized = match self.reader.read(&file) {
                Ok(text) => text,
                Err(e) => {
                    warn!("⚠️ Skipping {}", e);
                    continue;
                }
            };

            let Some(class) = self.reader.type_name(&normalized) else {
                debug!("No type declaration in {}", file.display());
                continue;
            };

            let relative = file.strip_prefix(source_dir).unwrap_or(&file);
            let role = self.classify(relative, &normalized);

            if !assignment.insert(class.clone(), RoleEntry { role, path: file.clone() }) {
                debug!("Duplicate class name {} in {}, keeping the first", class, file.display());
            }
        }

        if assignment.is_empty() {
            warn!("⚠️ No Java types found under {}", source_dir.display());
            return assignment;
        }

        let counts = assignment.counts();
        info!(
            "🏷️ {} classes: {} entry points, {} components, {} data access, {} unclassified",
            assignment.len(),
            counts.entry_points,
            counts.components,
            counts.data_access,
            counts.unclassified
        );

        assignment
    }
}

/// Roles that take part in tracing
pub fn is_active(role: Role) -> bool {
    ACTIVE_ROLES.contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn classify(path: &str, code: &str) -> Role {
        let classifier = RoleClassifier::new().unwrap();
        let normalized = SourceReader::new().unwrap().normalize(code);
        classifier.classify(Path::new(path), &normalized)
    }

    #[test]
    fn test_annotations_win() {
        assert_eq!(classify("web/Orders.java", "@RestController public class Orders {}"), Role::EntryPoint);
        assert_eq!(classify("repository/Billing.java", "@Service public class Billing {}"), Role::Component);
        assert_eq!(classify("x/Users.java", "@Repository public interface Users {}"), Role::DataAccess);
    }

    #[test]
    fn test_annotation_is_a_whole_word() {
        // @PathVariable is not @Path, @ServiceScope is not @Service
        assert_eq!(
            classify("x/Thing.java", "public class Thing { void f(@PathVariable Long id, @ServiceScope int s) {} }"),
            Role::Unclassified
        );
    }

    #[test]
    fn test_commented_annotation_is_ignored() {
        assert_eq!(classify("x/Legacy.java", "// @RestController\npublic class Legacy {}"), Role::Unclassified);
    }

    #[test]
    fn test_markers() {
        assert_eq!(classify("x/Login.java", "public class Login extends HttpServlet {}"), Role::EntryPoint);
        assert_eq!(
            classify("x/Cart.java", "public class Cart implements java.io.Serializable, SessionBean {}"),
            Role::Component
        );
        assert_eq!(
            classify("x/Store.java", "public class Store { private EntityManager em; }"),
            Role::DataAccess
        );
    }

    #[test]
    fn test_path_then_suffix() {
        assert_eq!(classify("com/acme/dao/Orders.java", "public class Orders {}"), Role::DataAccess);
        assert_eq!(classify("com/acme/OrderFacade.java", "public class OrderFacade {}"), Role::Component);
        assert_eq!(classify("com/acme/OrderResource.java", "public class OrderResource {}"), Role::EntryPoint);
        assert_eq!(classify("com/acme/Transaction.java", "public class Transaction {}"), Role::Unclassified);
    }

    #[test]
    fn test_classify_module() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("com/acme/OrderController.java")
            .write_str("package com.acme;\n@RestController\npublic class OrderController {}")
            .unwrap();
        temp.child("com/acme/Money.java")
            .write_str("package com.acme;\npublic final class Money {}")
            .unwrap();
        temp.child("com/acme/package-info.java").write_str("package com.acme;").unwrap();

        let classifier = RoleClassifier::new().unwrap();
        let roles = classifier.classify_module(temp.path());

        assert_eq!(roles.len(), 2);
        assert_eq!(roles.role_of("OrderController"), Role::EntryPoint);
        assert_eq!(roles.role_of("Money"), Role::Unclassified);
        assert!(!is_active(roles.role_of("Money")));
    }

    #[test]
    fn test_module_without_types() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("com/acme/package-info.java").write_str("package com.acme;").unwrap();

        let roles = RoleClassifier::new().unwrap().classify_module(temp.path());
        assert!(roles.is_empty());
        assert_eq!(roles.counts(), crate::core::model::RoleCounts::default());
    }
}
