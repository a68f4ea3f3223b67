use crate::metadata::{
    method::{Instruction, MethodFlags, MethodReference, MethodSignature},
    module::{Module, ModuleBuilder},
    token::Token,
    typesystem::TypeReference,
};

/// Tokens of the methods in [`create_widget_module`].
pub struct WidgetModule {
    pub module: Module,
    pub main: Token,
    pub make_widget: Token,
    pub widget_ctor: Token,
}

// Helper to create the `Main -> MakeWidget -> new Widget` module
pub fn create_widget_module() -> WidgetModule {
    let mut builder = ModuleBuilder::new("Widgets");
    let program = builder.add_class("Demo", "Program");
    let factory = builder.add_class("Demo", "Factory");
    let widget = builder.add_class("Demo", "Widget");

    let main = builder
        .add_method(program, "Main", MethodSignature::void(), MethodFlags::STATIC)
        .unwrap();
    let make_widget = builder
        .add_method(
            factory,
            "MakeWidget",
            MethodSignature::new("Demo.Widget", Vec::<String>::new()),
            MethodFlags::STATIC,
        )
        .unwrap();
    let widget_ctor = builder
        .add_method(widget, ".ctor", MethodSignature::void(), MethodFlags::empty())
        .unwrap();

    let write_line = create_external_method("System", "Console", "WriteLine");
    builder
        .set_body(
            main,
            vec![
                Instruction::call(0, builder.method_ref(make_widget).unwrap()).at("main.cs", 5),
                Instruction::other(5),
                Instruction::call(6, write_line).at("main.cs", 6),
                Instruction::other(11),
            ],
        )
        .unwrap();
    builder
        .set_body(
            make_widget,
            vec![
                Instruction::other(0).at("widget.cs", 9),
                Instruction::newobj(1, builder.method_ref(widget_ctor).unwrap()).at("widget.cs", 10),
                Instruction::other(6),
            ],
        )
        .unwrap();
    builder.set_body(widget_ctor, vec![Instruction::other(0)]).unwrap();

    WidgetModule {
        module: builder.build(),
        main,
        make_widget,
        widget_ctor,
    }
}

// Helper to create a reference to a method outside the module
pub fn create_external_method(namespace: &str, type_name: &str, name: &str) -> MethodReference {
    MethodReference::new(TypeReference::new(namespace, type_name), name)
}
