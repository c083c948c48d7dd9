//! Compiles a view declaration into an explicit route table.

use crate::error::RegistrationError;
use crate::views::view::{CustomKind, View};
use axum::routing::MethodFilter;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    pub(crate) fn method_filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Patch => MethodFilter::PATCH,
            Verb::Delete => MethodFilter::DELETE,
        }
    }
}

/// Builtin operations a view can expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Get,
    Update,
    PartialUpdate,
    Delete,
    List,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Create,
        Operation::Get,
        Operation::Update,
        Operation::PartialUpdate,
        Operation::Delete,
        Operation::List,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::PartialUpdate => "partial_update",
            Operation::Delete => "delete",
            Operation::List => "list",
        }
    }

    pub fn verb(self) -> Verb {
        match self {
            Operation::Create => Verb::Post,
            Operation::Get | Operation::List => Verb::Get,
            Operation::Update => Verb::Put,
            Operation::PartialUpdate => Verb::Patch,
            Operation::Delete => Verb::Delete,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Operation::Create | Operation::List => "/",
            _ => "/:pk",
        }
    }

    fn needs_input(self) -> bool {
        matches!(self, Operation::Create | Operation::Update | Operation::PartialUpdate)
    }

    fn needs_output(self) -> bool {
        !matches!(self, Operation::Delete)
    }
}

impl CustomKind {
    pub fn verb(self) -> Verb {
        match self {
            CustomKind::Post => Verb::Post,
            CustomKind::Get | CustomKind::List => Verb::Get,
            CustomKind::Put => Verb::Put,
            CustomKind::Patch => Verb::Patch,
            CustomKind::Delete => Verb::Delete,
        }
    }

    pub fn path(self, name: &str) -> String {
        if self.takes_pk() {
            format!("/{}/:pk", name)
        } else {
            format!("/{}", name)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteTarget {
    Builtin(Operation),
    Custom(CustomKind),
}

/// One compiled route; `path` is relative to the view's prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteSpec {
    pub verb: Verb,
    pub path: String,
    pub method: String,
    pub operation_id: String,
    pub target: RouteTarget,
}

/// `{view}_{path}_{method}`, with the path's slashes turned into underscores.
pub fn operation_id(view: &str, path: &str, method: &str) -> String {
    let path = path.trim_matches('/').replace('/', "_").replace(':', "");
    format!("{}_{}_{}", view.to_lowercase(), path, method)
}

fn valid_segment(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Route table for one view. Builtins come first in declaration order, then custom methods.
pub fn route_table(view: &View) -> Result<Vec<RouteSpec>, RegistrationError> {
    let invalid = |method: &str| RegistrationError::InvalidMethod {
        view: view.name.clone(),
        method: method.to_string(),
    };
    let custom_names: HashSet<&str> = view.custom.iter().map(|(_, n)| n.as_str()).collect();
    let mut routes = Vec::new();

    for name in &view.methods {
        let Some(op) = Operation::from_name(name) else {
            // Custom names listed in `methods` are registered through their own lists.
            if custom_names.contains(name.as_str()) {
                continue;
            }
            return Err(invalid(name));
        };
        if op.needs_input() && view.input_schema(name).is_none() {
            return Err(RegistrationError::MissingSchema {
                view: view.name.clone(),
                method: name.clone(),
                direction: "input",
            });
        }
        if op.needs_output() && view.output_schema(name).is_none() {
            return Err(RegistrationError::MissingSchema {
                view: view.name.clone(),
                method: name.clone(),
                direction: "output",
            });
        }
        routes.push(RouteSpec {
            verb: op.verb(),
            path: op.path().to_string(),
            method: name.clone(),
            operation_id: operation_id(&view.name, op.path(), name),
            target: RouteTarget::Builtin(op),
        });
    }

    for (kind, name) in &view.custom {
        if Operation::from_name(name).is_some() || !valid_segment(name) {
            return Err(invalid(name));
        }
        if !view.handlers.contains_key(name) {
            return Err(RegistrationError::MissingMethod {
                view: view.name.clone(),
                method: name.clone(),
            });
        }
        let path = kind.path(name);
        routes.push(RouteSpec {
            verb: kind.verb(),
            operation_id: operation_id(&view.name, &path, name),
            path,
            method: name.clone(),
            target: RouteTarget::Custom(*kind),
        });
    }

    let mut ids = HashSet::new();
    let mut pairs = HashSet::new();
    for r in &routes {
        if !ids.insert(r.operation_id.as_str()) {
            return Err(RegistrationError::DuplicateOperation(r.operation_id.clone()));
        }
        if !pairs.insert((r.verb, r.path.as_str())) {
            return Err(RegistrationError::DuplicateRoute {
                verb: r.verb.as_str(),
                path: r.path.clone(),
            });
        }
    }
    Ok(routes)
}
