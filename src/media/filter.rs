//! Типизированное описание фильтров ffmpeg
//!
//! Фильтр - это имя и упорядоченный список аргументов. Текстовый вид
//! (`name=a:b=c`, цепочки через `,`, графы через `;`) строится только на
//! границе с движком.

use std::fmt;

/// Аргумент фильтра
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    /// Позиционное значение: `atempo=1.5`
    Positional(String),
    /// Именованное значение: `inputs=2`
    Named(String, String),
}

/// Один фильтр
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Добавить позиционный аргумент
    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.args.push(FilterArg::Positional(value.to_string()));
        self
    }

    /// Добавить именованный аргумент
    pub fn option(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.args
            .push(FilterArg::Named(key.into(), value.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[FilterArg] {
        &self.args
    }

    /// Значение именованного аргумента
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            FilterArg::Named(k, v) if k == key => Some(v.as_str()),
            _ => None,
        })
    }

    /// Первое позиционное значение
    pub fn positional(&self) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            FilterArg::Positional(v) => Some(v.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            match arg {
                FilterArg::Positional(v) => f.write_str(v)?,
                FilterArg::Named(k, v) => write!(f, "{}={}", k, v)?,
            }
        }
        Ok(())
    }
}

/// Линейная цепочка фильтров
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl From<Filter> for FilterChain {
    fn from(filter: Filter) -> Self {
        Self::new().then(filter)
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        Ok(())
    }
}

/// Звено графа: входные метки, цепочка, выходные метки
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub inputs: Vec<String>,
    pub chain: FilterChain,
    pub outputs: Vec<String>,
}

/// Граф фильтров для `-filter_complex`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    nodes: Vec<GraphNode>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(
        mut self,
        inputs: Vec<String>,
        chain: impl Into<FilterChain>,
        outputs: Vec<String>,
    ) -> Self {
        self.nodes.push(GraphNode {
            inputs,
            chain: chain.into(),
            outputs,
        });
        self
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            for label in &node.inputs {
                write!(f, "[{}]", label)?;
            }
            write!(f, "{}", node.chain)?;
            for label in &node.outputs {
                write!(f, "[{}]", label)?;
            }
        }
        Ok(())
    }
}
