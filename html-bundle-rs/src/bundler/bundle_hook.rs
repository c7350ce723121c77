//! `import.meta` handling during bundling.

use deno_ast::swc::ast::{
    Bool, Expr, KeyValueProp, Lit, MemberExpr, MemberProp, MetaPropExpr, MetaPropKind, PropName,
    Str,
};
use deno_ast::swc::bundler::{Hook, ModuleRecord};
use deno_ast::swc::common::Span;

/// Gives every bundled module its own `import.meta.url` and `import.meta.main`.
///
/// Only the entry module keeps the runtime `import.meta.main`; inlined
/// dependencies read `false`, as they would when imported unbundled.
pub struct BundleHook;

fn prop(name: &str, value: Expr) -> KeyValueProp {
    KeyValueProp {
        key: PropName::Ident(name.into()),
        value: Box::new(value),
    }
}

fn import_meta_member(span: Span, name: &str) -> Expr {
    Expr::Member(MemberExpr {
        span,
        obj: Box::new(Expr::MetaProp(MetaPropExpr {
            span,
            kind: MetaPropKind::ImportMeta,
        })),
        prop: MemberProp::Ident(name.into()),
    })
}

impl Hook for BundleHook {
    fn get_import_meta_props(
        &self,
        span: Span,
        module_record: &ModuleRecord,
    ) -> Result<Vec<KeyValueProp>, anyhow::Error> {
        let url = Expr::Lit(Lit::Str(Str {
            span,
            value: module_record.file_name.to_string().into(),
            raw: None,
        }));
        let main = if module_record.is_entry {
            import_meta_member(span, "main")
        } else {
            Expr::Lit(Lit::Bool(Bool { span, value: false }))
        };

        Ok(vec![prop("url", url), prop("main", main)])
    }
}
