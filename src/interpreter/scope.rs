// パス: src/interpreter/scope.rs
// 役割: レキシカル環境（宣言的束縛の連鎖）を表す
// 意図: let/const の TDZ と、関数スコープの this 束縛を同じ構造で扱う
// 関連ファイル: src/interpreter/eval.rs, src/interpreter/function.rs

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use runtime_heap::Value;

pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Clone, Debug)]
pub struct Binding {
    /// `None` は初期化前（TDZ）。
    pub value: Option<Value>,
    pub mutable: bool,
}

#[derive(Debug)]
pub struct Scope {
    bindings: IndexMap<String, Binding>,
    parent: Option<ScopeRef>,
    /// 関数（アロー以外）とトップレベルだけが this を持つ。
    this_value: Option<Value>,
}

/// 識別子解決の結果。
pub enum Lookup {
    Found(Value),
    Uninitialized,
    Missing,
}

impl Scope {
    pub fn new_global(this_value: Value) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            bindings: IndexMap::new(),
            parent: None,
            this_value: Some(this_value),
        }))
    }

    pub fn new_block(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            bindings: IndexMap::new(),
            parent: Some(parent.clone()),
            this_value: None,
        }))
    }

    pub fn new_function(parent: &ScopeRef, this_value: Option<Value>) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            bindings: IndexMap::new(),
            parent: Some(parent.clone()),
            this_value,
        }))
    }

    pub fn parent(&self) -> Option<ScopeRef> {
        self.parent.clone()
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn declare(&mut self, name: &str, value: Option<Value>, mutable: bool) {
        self.bindings
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// 既存の束縛を初期化する（TDZ の解除）。
    pub fn initialize(&mut self, name: &str, value: Value) {
        if let Some(binding) = self.bindings.get_mut(name) {
            binding.value = Some(value);
        }
    }

    /// 宣言順の束縛名。
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }
}

/// 連鎖を外側へ辿って名前を解決する。
pub fn lookup(scope: &ScopeRef, name: &str) -> Lookup {
    let mut current = Some(scope.clone());
    while let Some(s) = current {
        let s = s.borrow();
        if let Some(binding) = s.bindings.get(name) {
            return match &binding.value {
                Some(v) => Lookup::Found(v.clone()),
                None => Lookup::Uninitialized,
            };
        }
        current = s.parent.clone();
    }
    Lookup::Missing
}

/// 代入の結果。
pub enum AssignResult {
    Done,
    Const,
    Uninitialized,
    Missing,
}

pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> AssignResult {
    let mut current = Some(scope.clone());
    while let Some(s) = current {
        let mut s_mut = s.borrow_mut();
        if let Some(binding) = s_mut.bindings.get_mut(name) {
            if binding.value.is_none() {
                return AssignResult::Uninitialized;
            }
            if !binding.mutable {
                return AssignResult::Const;
            }
            binding.value = Some(value);
            return AssignResult::Done;
        }
        current = s_mut.parent.clone();
    }
    AssignResult::Missing
}

/// 最も内側の this 束縛。
pub fn this_value(scope: &ScopeRef) -> Value {
    let mut current = Some(scope.clone());
    while let Some(s) = current {
        let s = s.borrow();
        if let Some(this) = &s.this_value {
            return this.clone();
        }
        current = s.parent.clone();
    }
    Value::Undefined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 内側のスコープから外側の束縛が見え、TDZ は区別される。
    fn lookup_walks_outward() {
        let global = Scope::new_global(Value::Undefined);
        global.borrow_mut().declare("a", Some(Value::Number(1.0)), true);
        global.borrow_mut().declare("b", None, true);
        let inner = Scope::new_block(&global);
        assert!(matches!(lookup(&inner, "a"), Lookup::Found(Value::Number(n)) if n == 1.0));
        assert!(matches!(lookup(&inner, "b"), Lookup::Uninitialized));
        assert!(matches!(lookup(&inner, "c"), Lookup::Missing));
    }

    #[test]
    /// const への代入は拒否される。
    fn assign_to_const_is_rejected() {
        let global = Scope::new_global(Value::Undefined);
        global.borrow_mut().declare("k", Some(Value::Null), false);
        assert!(matches!(assign(&global, "k", Value::Null), AssignResult::Const));
    }

    #[test]
    /// アロー関数相当のブロックは外側の this を引き継ぐ。
    fn this_is_lexical_through_blocks() {
        let global = Scope::new_global(Value::Boolean(true));
        let func = Scope::new_function(&global, Some(Value::Number(3.0)));
        let block = Scope::new_block(&func);
        assert!(matches!(this_value(&block), Value::Number(n) if n == 3.0));
    }
}
