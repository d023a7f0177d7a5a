//! Text templates for the generated C++ sources.

use crate::error::CoreError;

/// Every template the emitter renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    HeaderComment,
    Footer,
    HHeader,
    CppHeader,
    CxxHeader,
    ClassHeader,
    ClassHidden,
    SerializationHeader,
    SerializationProperty,
    DeserializationHeader,
    DeserializationProperty,
    MetaHeader,
    MetaProperty,
    MetaFooter,
}

/// Renders a template with `${name}` placeholders substituted.
///
/// Every provided placeholder must occur in the template at least once.
pub trait Render {
    fn render(&self, id: TemplateId, placeholders: &[(&str, &str)]) -> Result<String, CoreError>;
}

/// Templates compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinTemplates;

impl BuiltinTemplates {
    pub fn source(id: TemplateId) -> &'static str {
        match id {
            TemplateId::HeaderComment => HEADER_COMMENT,
            TemplateId::Footer => "\n",
            TemplateId::HHeader => H_HEADER,
            TemplateId::CppHeader => CPP_HEADER,
            TemplateId::CxxHeader => CXX_HEADER,
            TemplateId::ClassHeader => CLASS_HEADER,
            TemplateId::ClassHidden => CLASS_HIDDEN,
            TemplateId::SerializationHeader => concat!(
                "void ${class_name}::Serialization(json_t& json)\n",
                "{\n",
                "    super::Serialization(json);\n",
            ),
            TemplateId::SerializationProperty => "epiSerialize(${property_name}, json);\n",
            TemplateId::DeserializationHeader => concat!(
                "void ${class_name}::Deserialization(const json_t& json)\n",
                "{\n",
                "    super::Deserialization(json);\n",
            ),
            TemplateId::DeserializationProperty => "epiDeserialize(${property_name}, json);\n",
            TemplateId::MetaHeader => concat!(
                "MetaClass ${class_name}::EmitMetaClass()\n",
                "{\n",
                "    MetaClassData data;\n",
                "\n",
            ),
            TemplateId::MetaProperty => META_PROPERTY,
            TemplateId::MetaFooter => concat!(
                "    return MetaClass(std::move(data), epiHashCompileTime(${class_name}), ",
                "epiHashCompileTime(${class_parent_name}), sizeof(${class_name}), \"${class_name}\");\n",
                "}\n",
            ),
        }
    }
}

impl Render for BuiltinTemplates {
    fn render(&self, id: TemplateId, placeholders: &[(&str, &str)]) -> Result<String, CoreError> {
        let mut text = Self::source(id).to_string();
        for (name, value) in placeholders {
            let key = format!("${{{name}}}");
            if !text.contains(&key) {
                return Err(CoreError::Template {
                    id,
                    placeholder: (*name).to_string(),
                });
            }
            text = text.replace(&key, value);
        }
        Ok(text)
    }
}

const HEADER_COMMENT: &str = concat!(
    "/*                                                      */\n",
    "/*  ______       _                                      */\n",
    "/* |  ____|     (_)                                     */\n",
    "/* | |__   _ __  _                                      */\n",
    "/* |  __| | '_ \\| |   THIS FILE IS AUTO-GENERATED       */\n",
    "/* | |____| |_) | |   manual changes won't be saved     */\n",
    "/* |______| .__/|_|                                     */\n",
    "/*        | |                                           */\n",
    "/*        |_|                                           */\n",
    "/*                                                      */\n",
);

const H_HEADER: &str = concat!(
    "#pragma once\n",
    "\n",
    "GENREGION_BEGIN(include)\n",
    "#include \"${module_basename}.hxx\"\n",
    "GENREGION_END(include)\n",
    "\n",
    "NAMESPACE_BEGIN()\n",
    "\n",
    "NAMESPACE_END()\n",
);

const CPP_HEADER: &str = concat!(
    "GENREGION_BEGIN(include)\n",
    "#include \"${module_basename}.h\"\n",
    "GENREGION_END(include)\n",
    "\n",
    "NAMESPACE_BEGIN()\n",
    "\n",
    "NAMESPACE_END()\n",
);

const CXX_HEADER: &str = concat!("\n", "NAMESPACE_BEGIN()\n", "\n", "NAMESPACE_END()\n");

const CLASS_HEADER: &str = concat!(
    "\n",
    "EPI_GENHIDDEN_${class_name}()\n",
    "\n",
    "public:\n",
    "    constexpr static MetaTypeID TypeID{${class_typeid}};\n",
    "\n",
);

const CLASS_HIDDEN: &str = concat!(
    "#define EPI_GENHIDDEN_${class_name}() \\\n",
    "public: \\\n",
    "using super = ${class_parent_name}; \\\n",
    " \\\n",
    "static MetaClass EmitMetaClass(); \\\n",
    " \\\n",
    "const MetaClass& GetMetaClass() const override \\\n",
    "{ \\\n",
    "    super::GetMetaClass(); \\\n",
    "    return ClassRegistry_GetMetaClass<${class_name}>(); \\\n",
    "} \\\n",
    " \\\n",
    "epiBool Is(MetaTypeID rhs) const override \\\n",
    "{ \\\n",
    "    return rhs == ${class_name}::TypeID || super::Is(rhs); \\\n",
    "} \\\n",
    " \\\n",
    "void Serialization(json_t& json) override; \\\n",
    "void Deserialization(const json_t& json) override; \\\n",
    " \\\n",
);

const META_PROPERTY: &str = concat!(
    "{\n",
    "    MetaProperty m = epiMetaProperty(\n",
    "        /* Name */ \"${property_name}\",\n",
    "        /* PtrRead */ (void*)${property_ptr_read},\n",
    "        /* PtrWrite */ (void*)${property_ptr_write},\n",
    "        /* Flags */ {${property_flags}},\n",
    "        /* typeID */ ${property_typeid},\n",
    "        /* nestedTypeID */ ${property_nested_typeid}\n",
    "    );\n",
    "    data.AddProperty(epiHashCompileTime(${property_name}), std::move(m));\n",
    "}\n",
    "\n",
);
