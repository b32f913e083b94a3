//! Canonical identity strings.
//!
//! An identity string is the only key used to decide that two descriptors
//! from different listings describe the same element, and it is also what
//! reports and exception files show to people. The rendering is therefore
//! stable: changing anything here invalidates every persisted exception list.

use std::fmt::Write as _;

use crate::listing::{
    GenericParameterDescriptor, MemberDescriptor, MemberKind, ParameterDescriptor,
    ParameterDirection, TypeDescriptor, TypeKind,
};

impl TypeDescriptor {
    /// `{visibility} [static |abstract |sealed ]{kind} {Name}[ where ...]`
    pub fn id(&self) -> String {
        let mut id = String::new();
        id.push_str(self.visibility.keyword());
        id.push(' ');
        if self.is_static {
            id.push_str("static ");
        } else if self.kind == TypeKind::Class {
            if self.is_abstract {
                id.push_str("abstract ");
            }
            if self.is_sealed {
                id.push_str("sealed ");
            }
        }
        id.push_str(self.kind.keyword());
        id.push(' ');
        id.push_str(&self.name);
        id.push_str(&constraint_clauses(&self.generic_parameters));
        id
    }
}

impl MemberDescriptor {
    /// The canonical identity of the member within its type.
    pub fn id(&self) -> String {
        let mut id = String::new();
        if let Some(visibility) = self.visibility {
            id.push_str(visibility.keyword());
            id.push(' ');
        }

        match self.kind {
            MemberKind::Constructor => {
                id.push_str(&self.name);
            }
            MemberKind::Method => {
                if self.is_static {
                    id.push_str("static ");
                }
                if self.hides_inherited {
                    id.push_str("new ");
                }
                if self.is_abstract {
                    id.push_str("abstract ");
                } else if self.is_override {
                    if self.is_sealed {
                        id.push_str("sealed ");
                    }
                    id.push_str("override ");
                } else if self.is_virtual && !self.is_sealed {
                    id.push_str("virtual ");
                }
                if let Some(return_type) = &self.return_type {
                    id.push_str(return_type);
                    id.push(' ');
                }
                id.push_str(&self.name);
                id.push_str(&constraint_clauses(&self.generic_parameter));
            }
            MemberKind::Field => match &self.return_type {
                // Enumeration values carry no type of their own.
                None => {
                    id.push_str(&self.name);
                    if let Some(literal) = &self.literal {
                        let _ = write!(id, " = {}", literal);
                    }
                }
                Some(field_type) => {
                    if self.is_constant {
                        id.push_str("const ");
                    } else {
                        if self.is_static {
                            id.push_str("static ");
                        }
                        if self.is_read_only {
                            id.push_str("readonly ");
                        }
                    }
                    id.push_str(field_type);
                    id.push(' ');
                    id.push_str(&self.name);
                    if self.is_constant {
                        if let Some(literal) = &self.literal {
                            let _ = write!(id, " = {}", literal);
                        }
                    }
                }
            },
        }
        id
    }

    /// The member name without generic arguments or parameter list.
    ///
    /// `Select<TResult>(System.Int32 count)` becomes `Select`, and an
    /// explicit implementation such as `System.IEquatable<T>.Equals(T other)`
    /// keeps its interface prefix: `System.IEquatable<T>.Equals`.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }
}

/// Strip the parameter list and a trailing generic argument list from a
/// member name.
pub fn simple_name(name: &str) -> &str {
    let head = match name.find('(') {
        Some(paren) => &name[..paren],
        None => name,
    };
    if !head.ends_with('>') {
        return head;
    }
    let mut depth = 0usize;
    for (index, ch) in head.char_indices().rev() {
        match ch {
            '>' => depth += 1,
            '<' => {
                depth -= 1;
                if depth == 0 {
                    return &head[..index];
                }
            }
            _ => {}
        }
    }
    head
}

/// Compose a method or constructor name: `Name[<T, U>](params)`.
pub fn method_name(
    base: &str,
    generic_parameters: &[GenericParameterDescriptor],
    parameters: &[ParameterDescriptor],
    is_extension: bool,
) -> String {
    let mut name = String::from(base);
    if !generic_parameters.is_empty() {
        let names: Vec<&str> = generic_parameters
            .iter()
            .map(|p| p.parameter_name.as_str())
            .collect();
        let _ = write!(name, "<{}>", names.join(", "));
    }
    name.push('(');
    for (index, parameter) in parameters.iter().enumerate() {
        if index > 0 {
            name.push_str(", ");
        }
        if index == 0 && is_extension {
            name.push_str("this ");
        }
        name.push_str(&parameter.signature_text());
    }
    name.push(')');
    name
}

impl ParameterDescriptor {
    /// `[params ][out |ref ]{Type} {name}[ = {default}]`
    pub fn signature_text(&self) -> String {
        let mut text = String::new();
        if self.is_params {
            text.push_str("params ");
        }
        match self.direction {
            ParameterDirection::In => {}
            ParameterDirection::Out => text.push_str("out "),
            ParameterDirection::Ref => text.push_str("ref "),
        }
        text.push_str(&self.type_name);
        if !self.name.is_empty() {
            text.push(' ');
            text.push_str(&self.name);
        }
        if let Some(default) = &self.default_value {
            let _ = write!(text, " = {}", default);
        }
        text
    }
}

impl GenericParameterDescriptor {
    /// `where T : class, IFoo, new()`, or `None` for an unconstrained parameter.
    pub fn constraint_clause(&self) -> Option<String> {
        if !self.has_constraints() {
            return None;
        }
        let mut parts: Vec<&str> = Vec::new();
        if self.class_constraint {
            parts.push("class");
        }
        if self.struct_constraint {
            parts.push("struct");
        }
        parts.extend(self.base_type_or_interfaces.iter().map(String::as_str));
        if self.new_constraint && !self.struct_constraint {
            parts.push("new()");
        }
        Some(format!(
            "where {} : {}",
            self.parameter_name,
            parts.join(", ")
        ))
    }
}

fn constraint_clauses(parameters: &[GenericParameterDescriptor]) -> String {
    let mut text = String::new();
    for clause in parameters.iter().filter_map(|p| p.constraint_clause()) {
        text.push(' ');
        text.push_str(&clause);
    }
    text
}
