//! Declaration and tag expressions.
//!
//! An expression goes through three steps before it can run:
//!
//! 1. [`tokenize`] splits it on the delimiters `" ' ? : ( ) # = [ ]`, keeping
//!    string literals intact.
//! 2. [`qualify`] rewrites free identifiers to paths under the render scope
//!    (`name` becomes `_.name`) and completes else-less ternaries with `:""`.
//! 3. [`Expr::parse`] builds an evaluable tree from the qualified text.
//!
//! Expressions are sandboxed: they read and write a JSON scope and can reach
//! nothing else.

mod eval;
mod parse;
mod qualify;
mod tokenize;

pub use eval::{to_display, truthy};
pub use parse::{BinaryOp, Expr, UnaryOp};
pub use qualify::{SCOPE_ROOT, qualify};
pub use tokenize::{ExprToken, tokenize};

use crate::core::Result;

/// Tokenize, qualify and parse an expression as written in the markup.
///
/// # Errors
///
/// Returns [`crate::core::HandlebarError::InvalidExpression`] when the qualified
/// text does not parse.
///
/// # Examples
///
/// ```
/// use handlebar::templating::expr::compile_expression;
/// use serde_json::json;
///
/// let mut scope = json!({"data": {"first": "Ada"}});
/// compile_expression(r#"greeting = "Hi " + data.first"#)?.execute(&mut scope);
/// assert_eq!(scope["greeting"], "Hi Ada");
/// # Ok::<(), handlebar::core::HandlebarError>(())
/// ```
pub fn compile_expression(source: &str) -> Result<Expr> {
    let qualified = qualify(&tokenize(source));
    tracing::trace!("Qualified expression '{}' as '{}'", source, qualified);
    Expr::parse(&qualified)
}
