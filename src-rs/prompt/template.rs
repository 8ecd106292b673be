use super::request::GenerationRequest;

const CALL_TO_ACTION: &str = "Please generate a project starter prompt with best practices.";

const FOLDER_STRUCTURE: &str = "\
├── app/
│   ├── core/               # Configs, utils, security
│   ├── api/                # HTTP routes
│   ├── models/             # Data models
│   ├── tasks/              # Background tasks
│   └── main                # Application entrypoint
├── tests/                  # Tests (API, tasks, etc.)
├── .env                    # Environment variables
├── dependency manifest     # Dependencies
├── docker-compose.yml      # Broker + App + Worker setup (optional)
└── README.md               # Setup readme with basic information about the project
";

/// Formats the request into the fixed local template. Same input, same text.
pub fn render_project_summary(req: &GenerationRequest) -> String {
    format!(
        "Objective: {}\nTech Stack: {}\nGit Tool: {}\nUser Info: {}\n{}",
        req.objective, req.tech_stack, req.git_tool, req.user_info, CALL_TO_ACTION
    )
}

/// System message for the inference-backed composer. Embeds the project summary.
pub fn build_system_message(project_summary: &str) -> String {
    let mut msg = String::with_capacity(1024 + project_summary.len());
    msg.push_str("You are an expert project assistant. Build my project with best coding practices.\n");
    msg.push_str("My Project Information and Context on Technology:\n");
    msg.push_str(project_summary);
    msg.push('\n');
    msg.push_str("Folder structure modular design:\n");
    msg.push_str(FOLDER_STRUCTURE);
    msg.push_str("Start by creating the project manifest file (if not present).\n");
    msg.push_str("Run the command on the terminal to initialize it.\n");
    msg.push_str("Next set up the virtual environment or toolchain for the stack.\n");
    msg.push_str("Next please create the folder structure and files.\n");
    msg.push_str(
        "Note: when I ask to create code/function/class try to use best industry standards \
         of that technology specified and add enough documentation to the respective file/function/code.\n",
    );
    msg
}
