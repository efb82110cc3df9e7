//! Shared intermediate representation for **jsrecon**.
//!
//! [`ast`] holds the typed JavaScript syntax tree produced by the
//! `parsers` crate; [`cfg`] holds the statement-level control flow graph
//! built over it by the engine. Both carry [`Span`] location data so
//! findings can point back at the original bundle.

pub mod ast;
pub mod cfg;

pub use ast::{
    number_to_string, Class, ClassId, ClassMember, Expr, ExprKind, FnBody, FnId, ForHead,
    Function, ImportBinding, ImportDecl, JsxAttr, JsxElement, LogicalOp, MemberKind, MemberProp,
    ObjectPatProp, Pat, Program, Prop, PropKey, Span, Stmt, StmtKind, SwitchCase, VarDecl,
    VarDeclarator, VarKind,
};
pub use cfg::{CFGNode, CFG};

#[cfg(test)]
mod tests;
