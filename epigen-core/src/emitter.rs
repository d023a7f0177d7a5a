//! Rendering of linked symbols into C++ text.
//!
//! Everything here is pure: the functions return text and the generator
//! decides where it goes.

use crate::attr::AttributeKind;
use crate::codegen::Artifact;
use crate::error::CoreError;
use crate::symbol::{Attributed, Class, EntryValue, Enum, Property, PropertyForm, Resolved, Symbol, name_hash};
use crate::template::{Render, TemplateId};

pub const NAMESPACE_BEGIN: &str = "NAMESPACE_BEGIN()";
pub const NAMESPACE_END: &str = "NAMESPACE_END()";
pub const INCLUDE_REGION: &str = "include";

pub fn region_begin(caption: &str) -> String {
    format!("GENREGION_BEGIN({caption})")
}

pub fn region_end(caption: &str) -> String {
    format!("GENREGION_END({caption})")
}

/// Line-oriented text builder with indentation and region anchors.
pub struct Builder<'t> {
    templates: &'t dyn Render,
    indent: usize,
    lines: Vec<String>,
    open_region: bool,
}

impl<'t> Builder<'t> {
    pub fn new(templates: &'t dyn Render) -> Self {
        Self {
            templates,
            indent: 0,
            lines: Vec::new(),
            open_region: false,
        }
    }

    pub fn line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if line.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{line}", "    ".repeat(self.indent)));
        }
    }

    pub fn empty(&mut self) {
        self.lines.push(String::new());
    }

    pub fn tab(&mut self) {
        self.indent += 1;
    }

    pub fn untab(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn region_begin(&mut self, caption: &str) {
        debug_assert!(!self.open_region, "nested generated region");
        self.lines.push(region_begin(caption));
        self.open_region = true;
    }

    pub fn region_end(&mut self, caption: &str) {
        debug_assert!(self.open_region, "unbalanced generated region");
        self.lines.push(region_end(caption));
        self.open_region = false;
    }

    pub fn template(&mut self, id: TemplateId, placeholders: &[(&str, &str)]) -> Result<(), CoreError> {
        let text = self.templates.render(id, placeholders)?;
        for line in text.lines() {
            self.line(line);
        }
        Ok(())
    }

    pub fn extend(&mut self, lines: Vec<String>) {
        self.lines.extend(lines);
    }

    pub fn into_lines(self) -> Vec<String> {
        debug_assert!(!self.open_region, "unbalanced generated region");
        self.lines
    }

    pub fn build(self) -> String {
        self.into_lines().join("\n")
    }
}

/// Text placed between a region's anchors.
pub fn region_span(lines: &[String]) -> String {
    let mut span: String = lines.iter().map(|line| format!("\n{line}")).collect();
    span.push('\n');
    span
}

/// A freshly created artifact for the module-qualified `module_basename`.
pub fn skeleton(artifact: Artifact, module_basename: &str, templates: &dyn Render) -> Result<String, CoreError> {
    let mut builder = Builder::new(templates);
    let basename = [("module_basename", module_basename)];
    match artifact {
        Artifact::Header => builder.template(TemplateId::HHeader, &basename)?,
        Artifact::Source => builder.template(TemplateId::CppHeader, &basename)?,
        Artifact::HiddenHeader => builder.template(TemplateId::HeaderComment, &[])?,
        Artifact::HiddenSource => {
            builder.template(TemplateId::HeaderComment, &[])?;
            builder.template(TemplateId::CxxHeader, &[])?;
        }
    }
    builder.template(TemplateId::Footer, &[])?;
    Ok(builder.build())
}

/// Content of the `include` region of a public artifact.
pub fn include_lines(artifact: Artifact, module_basename: &str) -> Vec<String> {
    match artifact {
        Artifact::Source => vec![format!("#include \"{module_basename}.h\"")],
        _ => vec![format!("#include \"{module_basename}.hxx\"")],
    }
}

/// Content of a symbol's region in the public header.
pub fn symbol_region(symbol: &Symbol, templates: &dyn Render) -> Result<Vec<String>, CoreError> {
    match symbol {
        Symbol::Class(class) => class_declaration(class, templates),
        Symbol::Enum(enumeration) => {
            let mut builder = Builder::new(templates);
            builder.tab();
            push_entries(&mut builder, enumeration);
            Ok(builder.into_lines())
        }
    }
}

/// A symbol's whole declaration, anchors included, for appending to a header.
pub fn symbol_skeleton(symbol: &Symbol, templates: &dyn Render) -> Result<String, CoreError> {
    let region = symbol_region(symbol, templates)?;
    let mut builder = Builder::new(templates);
    match symbol {
        Symbol::Class(class) => {
            builder.line(format!("class {} : public {}", class.name(), parent_of(class)));
        }
        Symbol::Enum(enumeration) => builder.line(enum_head(enumeration)),
    }
    builder.line("{");
    builder.region_begin(symbol.name());
    builder.extend(region);
    builder.region_end(symbol.name());
    builder.line("};");
    builder.empty();
    Ok(builder.build())
}

fn parent_of(class: &Class) -> &str {
    class.parent_name().unwrap_or("Object")
}

fn enum_head(enumeration: &Enum) -> String {
    match &enumeration.base {
        Some(base) => format!("enum {} : {}", enumeration.name(), base.text),
        None => format!("enum {}", enumeration.name()),
    }
}

fn push_entries(builder: &mut Builder<'_>, enumeration: &Enum) {
    for (index, entry) in enumeration.entries.iter().enumerate() {
        let value = match &entry.value {
            Some(EntryValue::Integer(token)) => Some(token.text.clone()),
            Some(EntryValue::Flags(operands)) => {
                let names: Vec<&str> = operands.iter().map(|t| t.text.as_str()).collect();
                Some(names.join(" | "))
            }
            None if enumeration.is_flag_mask() => Some(format!("1 << {index}")),
            None => None,
        };
        match value {
            Some(value) => builder.line(format!("{} = {value},", entry.name())),
            None => builder.line(format!("{},", entry.name())),
        }
    }
}

fn class_declaration(class: &Class, templates: &dyn Render) -> Result<Vec<String>, CoreError> {
    let name = class.name();
    let typeid = format!("{:#x}", name_hash(name));
    let mut builder = Builder::new(templates);
    builder.template(
        TemplateId::ClassHeader,
        &[("class_name", name), ("class_typeid", typeid.as_str())],
    )?;

    builder.tab();
    builder.line(format!("enum {name}_PIDs"));
    builder.line("{");
    builder.tab();
    for property in &class.properties {
        builder.line(format!("PID_{} = {:#x},", property.name(), name_hash(property.name())));
    }
    builder.line(format!("PID_COUNT = {}", class.properties.len()));
    builder.untab();
    builder.line("};");
    builder.empty();

    for inner in class.inner_enums.values() {
        builder.line(enum_head(inner));
        builder.line("{");
        builder.tab();
        push_entries(&mut builder, inner);
        builder.untab();
        builder.line("};");
        builder.empty();
    }

    let accessors: Vec<Accessors<'_>> = class.properties.iter().map(Accessors::new).collect();
    let callbacks: Vec<String> = accessors.iter().flat_map(Accessors::callback_declarations).collect();
    if !callbacks.is_empty() {
        builder.untab();
        builder.line("protected:");
        builder.tab();
        for callback in callbacks {
            builder.line(callback);
        }
        builder.empty();
    }

    let fields: Vec<&Property> = class
        .properties
        .iter()
        .filter(|property| !property.has_attr(AttributeKind::Virtual))
        .collect();
    if !fields.is_empty() {
        builder.untab();
        builder.line("protected:");
        builder.tab();
        for property in fields {
            builder.line(field(property));
        }
        builder.empty();
    }
    builder.untab();
    Ok(builder.into_lines())
}

fn field(property: &Property) -> String {
    let init = property
        .effective_value()
        .map(|value| match &property.resolved {
            Some(Resolved::Enum(owner)) if !value.text.contains("::") => {
                format!("{{{owner}::{}}}", value.text)
            }
            _ => format!("{{{}}}", value.text),
        })
        .unwrap_or_default();
    format!("{} m_{}{init};", property.type_name(), property.name())
}

/// The `EPI_GENHIDDEN_<Class>()` macro of the build header.
pub fn class_hidden(class: &Class, templates: &dyn Render) -> Result<String, CoreError> {
    let name = class.name();
    let mut builder = Builder::new(templates);
    builder.template(
        TemplateId::ClassHidden,
        &[("class_name", name), ("class_parent_name", parent_of(class))],
    )?;

    let accessors: Vec<Accessors<'_>> = class.properties.iter().map(Accessors::new).collect();
    let mut any = false;
    for accessor in &accessors {
        for line in accessor.definitions() {
            builder.line(format!("{line} \\"));
            any = true;
        }
    }
    if any {
        builder.line(" \\");
    }

    builder.line(format!("enum {name}_PIDXs \\"));
    builder.line("{ \\");
    builder.tab();
    for (index, property) in class.properties.iter().enumerate() {
        builder.line(format!("PIDX_{} = {index}, \\", property.name()));
    }
    builder.line(format!("PIDX_COUNT = {} \\", class.properties.len()));
    builder.untab();
    builder.line("}; \\");

    let pointers: Vec<String> = accessors
        .iter()
        .flat_map(|accessor| accessor.function_pointers(name))
        .collect();
    if !pointers.is_empty() {
        builder.line(" \\");
        builder.line("private: \\");
        for pointer in pointers {
            builder.line(format!("{pointer} \\"));
        }
    }
    builder.empty();
    builder.empty();
    Ok(builder.build())
}

pub fn class_serialization(class: &Class, templates: &dyn Render) -> Result<String, CoreError> {
    let name = class.name();
    let persistent: Vec<&Property> = class
        .properties
        .iter()
        .filter(|property| !property.has_attr(AttributeKind::Transient))
        .collect();

    let mut builder = Builder::new(templates);
    let passes = [
        (TemplateId::SerializationHeader, TemplateId::SerializationProperty),
        (TemplateId::DeserializationHeader, TemplateId::DeserializationProperty),
    ];
    for (header, item) in passes {
        builder.template(header, &[("class_name", name)])?;
        if !persistent.is_empty() {
            builder.empty();
            builder.tab();
            for property in &persistent {
                builder.template(item, &[("property_name", property.name())])?;
            }
            builder.untab();
        }
        builder.line("}");
        builder.empty();
    }
    Ok(builder.build())
}

/// The reflection table emitted into `EmitMetaClass`.
pub fn class_meta(class: &Class, templates: &dyn Render) -> Result<String, CoreError> {
    let name = class.name();
    let mut builder = Builder::new(templates);
    builder.template(TemplateId::MetaHeader, &[("class_name", name)])?;

    builder.tab();
    for property in &class.properties {
        let readable = !property.has_attr(AttributeKind::WriteOnly);
        let writable = !property.has_attr(AttributeKind::ReadOnly);
        let read_callback = property.has_attr(AttributeKind::ReadCallback);
        let write_callback = property.has_attr(AttributeKind::WriteCallback);

        let member = format!("offsetof({name}, m_{})", property.name());
        let ptr_read = match (readable, read_callback) {
            (false, _) => "nullptr".to_string(),
            (true, true) => format!("offsetof({name}, Get{}_FuncPtr)", property.name()),
            (true, false) => member.clone(),
        };
        let ptr_write = match (writable, write_callback) {
            (false, _) => "nullptr".to_string(),
            (true, true) => format!("offsetof({name}, Set{}_FuncPtr)", property.name()),
            (true, false) => member,
        };

        let masks: Vec<String> = [
            AttributeKind::ReadCallback,
            AttributeKind::WriteCallback,
            AttributeKind::ReadOnly,
            AttributeKind::WriteOnly,
        ]
        .into_iter()
        .filter(|kind| property.has_attr(*kind))
        .map(|kind| format!("MetaProperty::Flags::Mask{kind:?}"))
        .collect();
        let flags = masks.join(" | ");

        let base = property.type_base();
        let (typeid, nested) = match property.form {
            PropertyForm::Pointer => ("MetaTypeID_Ptr".to_string(), format!("epiHashCompileTime({base})")),
            PropertyForm::Template => {
                let nested = property
                    .nested_type_args
                    .first()
                    .map(|arg| format!("epiHashCompileTime({})", arg.text))
                    .unwrap_or_else(|| "MetaTypeID_None".to_string());
                (format!("epiHashCompileTime({base})"), nested)
            }
            PropertyForm::Plain => (format!("epiHashCompileTime({base})"), "MetaTypeID_None".to_string()),
        };

        builder.template(
            TemplateId::MetaProperty,
            &[
                ("property_name", property.name()),
                ("property_ptr_read", ptr_read.as_str()),
                ("property_ptr_write", ptr_write.as_str()),
                ("property_flags", flags.as_str()),
                ("property_typeid", typeid.as_str()),
                ("property_nested_typeid", nested.as_str()),
            ],
        )?;
    }
    builder.untab();

    builder.template(
        TemplateId::MetaFooter,
        &[("class_name", name), ("class_parent_name", parent_of(class))],
    )?;
    builder.empty();
    Ok(builder.build())
}

/// Accessor signatures of one property.
struct Accessors<'p> {
    property: &'p Property,
    /// Type spelling without the pointer star.
    base: String,
}

impl<'p> Accessors<'p> {
    fn new(property: &'p Property) -> Self {
        let spelled = property.type_name();
        let base = spelled.strip_suffix('*').unwrap_or(&spelled).to_string();
        Self { property, base }
    }

    fn by_value(&self) -> bool {
        self.property.is_fundamental() || matches!(self.property.resolved, Some(Resolved::Enum(_)))
    }

    fn named(&self, kind: AttributeKind, param: &str) -> bool {
        self.property
            .attr(kind)
            .is_some_and(|attr| attr.named_bool(param))
    }

    fn getter_type(&self) -> String {
        let base = &self.base;
        if self.property.form == PropertyForm::Pointer {
            format!("const {base}*")
        } else if self.by_value() || self.named(AttributeKind::ReadCallback, "SuppressRef") {
            base.clone()
        } else {
            format!("const {base}&")
        }
    }

    fn setter_type(&self) -> String {
        let base = &self.base;
        if self.property.form == PropertyForm::Pointer {
            format!("{base}*")
        } else if self.by_value() || self.named(AttributeKind::WriteCallback, "SuppressRef") {
            base.clone()
        } else if self.named(AttributeKind::WriteCallback, "RValueRef") {
            format!("{base}&&")
        } else {
            format!("const {base}&")
        }
    }

    fn readable(&self) -> bool {
        !self.property.has_attr(AttributeKind::WriteOnly)
    }

    fn writable(&self) -> bool {
        !self.property.has_attr(AttributeKind::ReadOnly)
    }

    fn read_callback(&self) -> bool {
        self.readable() && self.property.has_attr(AttributeKind::ReadCallback)
    }

    fn write_callback(&self) -> bool {
        self.writable() && self.property.has_attr(AttributeKind::WriteCallback)
    }

    fn callback_declarations(&self) -> Vec<String> {
        let name = self.property.name();
        let mut lines = Vec::new();
        if self.read_callback() {
            lines.push(format!("{} Get{name}_Callback() const;", self.getter_type()));
        }
        if self.write_callback() {
            lines.push(format!("void Set{name}_Callback({} value);", self.setter_type()));
        }
        lines
    }

    fn definitions(&self) -> Vec<String> {
        let name = self.property.name();
        let mut lines = Vec::new();
        if self.readable() {
            let (inline, body) = if self.read_callback() {
                ("", format!("return Get{name}_Callback();"))
            } else {
                ("inline ", format!("return m_{name};"))
            };
            lines.push(format!("{inline}{} Get{name}() const {{ {body} }}", self.getter_type()));
        }
        if self.writable() {
            let mut body = Vec::new();
            for attr in self.property.attrs() {
                let bound = attr.positional.first().map(|token| token.text.as_str());
                let force = attr.named_bool("Force");
                match (attr.kind, bound) {
                    (AttributeKind::Min, Some(v)) if force => body.push(format!("value = std::max(value, {v});")),
                    (AttributeKind::Min, Some(v)) => body.push(format!("epiExpected(value >= {v});")),
                    (AttributeKind::Max, Some(v)) if force => body.push(format!("value = std::min(value, {v});")),
                    (AttributeKind::Max, Some(v)) => body.push(format!("epiExpected(value <= {v});")),
                    _ => {}
                }
            }
            let bounded = !body.is_empty();
            if self.write_callback() {
                if self.named(AttributeKind::WriteCallback, "RValueRef") {
                    body.push(format!("Set{name}_Callback(std::move(value));"));
                } else {
                    body.push(format!("Set{name}_Callback(value);"));
                }
            } else {
                body.push(format!("m_{name} = value;"));
            }
            let inline = if bounded || self.write_callback() { "" } else { "inline " };
            lines.push(format!(
                "{inline}void Set{name}({} value) {{ {} }}",
                self.setter_type(),
                body.join(" ")
            ));
        }
        lines
    }

    fn function_pointers(&self, class: &str) -> Vec<String> {
        let name = self.property.name();
        let mut lines = Vec::new();
        if self.read_callback() {
            lines.push(format!(
                "{} ({class}::*Get{name}_FuncPtr)() const {{ &{class}::Get{name} }};",
                self.getter_type()
            ));
        }
        if self.write_callback() {
            lines.push(format!(
                "void ({class}::*Set{name}_FuncPtr)({}) {{ &{class}::Set{name} }};",
                self.setter_type()
            ));
        }
        lines
    }
}
