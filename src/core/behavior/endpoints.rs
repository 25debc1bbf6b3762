// src/core/behavior/endpoints.rs
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::model::Operation;
use crate::core::source::SourceReader;
use crate::error::Result;
use super::body::MethodDecl;

/// Finds the externally reachable operations of an entry-point class
pub struct EndpointScanner {
    mapping: Regex,
    request_body: Regex,
    response_status: Regex,
    annotation: Regex,
    leading_modifiers: Regex,
    payload_field: Regex,
}

impl EndpointScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            mapping: Regex::new(
                r"@(?:GetMapping|PostMapping|PutMapping|DeleteMapping|PatchMapping|RequestMapping|GET|POST|PUT|DELETE|PATCH)\b",
            )?,
            request_body: Regex::new(
                r"@RequestBody\b(?:\s*\([^)]*\))?\s+(?:@\w+(?:\s*\([^)]*\))?\s+)*(?:final\s+)?([\w.]+(?:<[^()]*?>)?)\s+\w+",
            )?,
            response_status: Regex::new(
                r"@ResponseStatus\s*\(\s*(?:(?:code|value)\s*=\s*)?(?:HttpStatus\.)?(\w+)",
            )?,
            annotation: Regex::new(r"@\w+(?:\s*\([^)]*\))?")?,
            leading_modifiers: Regex::new(
                r"^(?:(?:public|protected|private|static|final|synchronized|abstract|default|native)\s+)*(?:<[^>]*>\s*)?",
            )?,
            payload_field: Regex::new(
                r"\b(?:private|protected|public)\s+(?:final\s+)?([\w.]+(?:<[^;=]*?>)?(?:\[\])*)\s+(\w+)\s*;",
            )?,
        })
    }

    /// Operations of `class_name`, in declaration order. Mapped handler methods
    /// when there are any, otherwise every public instance method with a body.
    pub fn operations(
        &self,
        class_name: &str,
        methods: &[MethodDecl],
        source_dir: &Path,
        reader: &SourceReader,
    ) -> Vec<Operation> {
        let mapped: Vec<&MethodDecl> = methods
            .iter()
            .filter(|m| self.mapping.is_match(m.header))
            .collect();

        let selected: Vec<&MethodDecl> = if mapped.is_empty() {
            debug!("No mapped handlers in {}, using public methods", class_name);
            methods
                .iter()
                .filter(|m| m.body.is_some() && m.is_public() && !m.is_static() && m.name != class_name)
                .collect()
        } else {
            mapped
        };

        let mut seen = BTreeSet::new();
        selected
            .into_iter()
            .filter(|m| seen.insert(m.name))
            .map(|m| self.describe(m, source_dir, reader))
            .collect()
    }

    fn describe(&self, method: &MethodDecl, source_dir: &Path, reader: &SourceReader) -> Operation {
        let mut operation = Operation::named(method.name);

        if let Some(caps) = self.request_body.captures(method.params) {
            let payload = caps[1].to_string();
            operation.request_fields = self.payload_fields(&payload, source_dir, reader);
            operation.request_type = Some(payload);
        }

        operation.response_type = self.response_type(method.header);
        operation.response_status = self
            .response_status
            .captures(method.header)
            .map(|caps| caps[1].to_string());

        operation
    }

    /// Declared return type with `ResponseEntity<...>` unwrapped; `None` for `void`
    fn response_type(&self, header: &str) -> Option<String> {
        let without_annotations = self.annotation.replace_all(header, " ");
        let declared = self
            .leading_modifiers
            .replace(without_annotations.trim(), "")
            .trim()
            .to_string();

        let unwrapped = declared
            .strip_prefix("ResponseEntity<")
            .and_then(|inner| inner.strip_suffix('>'))
            .map(|inner| inner.trim().to_string())
            .unwrap_or(declared);

        match unwrapped.as_str() {
            "" | "void" | "Void" | "?" => None,
            _ => Some(unwrapped),
        }
    }

    /// `name: Type` pairs declared in `<Type>.java` under the source root
    fn payload_fields(&self, payload: &str, source_dir: &Path, reader: &SourceReader) -> Vec<String> {
        let simple = payload.split('<').next().unwrap_or(payload);
        let simple = simple.rsplit('.').next().unwrap_or(simple);

        let Some(file) = find_type_file(source_dir, simple) else {
            debug!("No source for payload type {}", simple);
            return Vec::new();
        };

        match reader.read(&file) {
            Ok(normalized) => self
                .payload_field
                .captures_iter(&normalized)
                .map(|caps| format!("{}: {}", &caps[2], &caps[1]))
                .collect(),
            Err(e) => {
                warn!("⚠️ Could not read payload type {}: {}", simple, e);
                Vec::new()
            }
        }
    }
}

fn find_type_file(source_dir: &Path, type_name: &str) -> Option<PathBuf> {
    let wanted = format!("{}.java", type_name);
    WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name().to_string_lossy().eq_ignore_ascii_case(&wanted))
        .map(|e| e.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::behavior::body::SourceIndex;
    use assert_fs::prelude::*;

    fn scan(code: &str, class: &str, source_dir: &Path) -> Vec<Operation> {
        let reader = SourceReader::new().unwrap();
        let normalized = reader.normalize(code);
        let index = SourceIndex::new(&normalized);
        EndpointScanner::new()
            .unwrap()
            .operations(class, &index.methods(), source_dir, &reader)
    }

    #[test]
    fn test_mapped_operations() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("com/acme/dto/OrderRequest.java")
            .write_str(
                "public class OrderRequest {\n  private static final long serialVersionUID = 1L;\n  private String sku;\n  private List<Integer> quantities;\n}",
            )
            .unwrap();

        let code = r#"
            @RestController
            @RequestMapping("/orders")
            public class OrderController {
                @PostMapping
                @ResponseStatus(HttpStatus.CREATED)
                public ResponseEntity<OrderDto> create(@Valid @RequestBody final OrderRequest request) {
                    return ResponseEntity.ok(service.place(request));
                }

                @GetMapping("/{id}")
                public OrderDto find(@PathVariable Long id) { return service.find(id); }

                @GetMapping(value = "/{id}", params = "v2")
                public OrderDto find(@PathVariable Long id, @RequestParam String v) { return null; }

                @DeleteMapping("/{id}")
                public void remove(@PathVariable Long id) { service.remove(id); }

                private void audit() { }
            }
        "#;

        let operations = scan(code, "OrderController", temp.path());
        let names: Vec<&str> = operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["create", "find", "remove"]);

        let create = &operations[0];
        assert_eq!(create.request_type.as_deref(), Some("OrderRequest"));
        assert_eq!(create.request_fields, vec!["sku: String", "quantities: List<Integer>"]);
        assert_eq!(create.response_type.as_deref(), Some("OrderDto"));
        assert_eq!(create.response_status.as_deref(), Some("CREATED"));

        let remove = &operations[2];
        assert_eq!(remove.request_type, None);
        assert_eq!(remove.response_type, None);
        assert_eq!(remove.response_status, None);
    }

    #[test]
    fn test_jax_rs_annotations() {
        let temp = assert_fs::TempDir::new().unwrap();
        let code = "@Path(\"/users\") public class UserResource { @GET @Produces(\"application/json\") public Response list() { return null; } public void helper() { } }";
        let operations = scan(code, "UserResource", temp.path());
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].name, "list");
        assert_eq!(operations[0].response_type.as_deref(), Some("Response"));
    }

    #[test]
    fn test_public_method_fallback() {
        let temp = assert_fs::TempDir::new().unwrap();
        let code = r#"
            public class LoginServlet extends HttpServlet {
                public LoginServlet() { }
                public void doPost(HttpServletRequest req, HttpServletResponse resp) { users.authenticate(req); }
                protected void doGet(HttpServletRequest req, HttpServletResponse resp) { }
                public static LoginServlet create() { return new LoginServlet(); }
                public abstract void hook();
                public String describe() { return "login"; }
            }
        "#;
        let operations = scan(code, "LoginServlet", temp.path());
        let names: Vec<&str> = operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["doPost", "describe"]);
        assert_eq!(operations[1].response_type.as_deref(), Some("String"));
    }

    #[test]
    fn test_missing_payload_source() {
        let temp = assert_fs::TempDir::new().unwrap();
        let code = "@RestController public class A { @PutMapping public void update(@RequestBody Map<String, Object> body) { } }";
        let operations = scan(code, "A", temp.path());
        assert_eq!(operations[0].request_type.as_deref(), Some("Map<String, Object>"));
        assert!(operations[0].request_fields.is_empty());
    }
}
