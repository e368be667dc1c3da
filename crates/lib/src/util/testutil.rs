//! Test utilities for graft-lib.

use crate::spec::Spec;
use crate::state::{Definition, ExecOp, Op};

/// A package with one patched directory source and one plain file source.
pub const PATCHED_SPEC: &str = r#"
name: hello
version: "1.0"
sources:
  main:
    git:
      url: https://example.com/main.git
      commit: v1
  fix:
    inline:
      file:
        contents: "--- a/x\n+++ b/x\n"
  vendor:
    http:
      url: https://example.com/vendor.tar.gz
patches:
  main: [fix]
"#;

pub fn patched_spec() -> Spec {
  Spec::from_yaml(PATCHED_SPEC).expect("test spec parses")
}

/// Every exec op of `def`, in definition order.
pub fn exec_ops(def: &Definition) -> Vec<&ExecOp> {
  def
    .ops
    .iter()
    .filter_map(|entry| match &entry.op {
      Op::Exec(op) => Some(op),
      _ => None,
    })
    .collect()
}

/// The `sh -c` scripts of every exec op of `def`, in definition order.
pub fn shell_scripts(def: &Definition) -> Vec<&str> {
  exec_ops(def)
    .into_iter()
    .filter_map(|op| match op.meta.args.as_slice() {
      [sh, flag, script] if sh == "sh" && flag == "-c" => Some(script.as_str()),
      _ => None,
    })
    .collect()
}
