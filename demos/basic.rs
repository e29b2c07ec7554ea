use handle_table::{Handle, HandleTable};

struct Texture {
    name: &'static str,
}

fn main() {
    env_logger::init();

    // Objects owned by the caller; the table only records where they live
    // 对象由调用者拥有；表只记录它们的位置
    let mut textures = [
        Texture { name: "grass" },
        Texture { name: "stone" },
        Texture { name: "water" },
    ];

    // 1. Create a new HandleTable
    // 1. 创建一个新的 HandleTable
    let mut table: HandleTable<Texture> = HandleTable::new();

    // 2. Allocate handles and register the objects
    // 2. 分配 handle 并注册对象
    println!("Registering textures...");
    let mut handles = Vec::new();
    for texture in textures.iter_mut() {
        let handle = table.allocate().expect("out of memory");
        table.set(handle, texture);
        handles.push(handle);
    }

    // 3. External code only ever sees the raw values
    // 3. 外部代码只能看到原始值
    let raw: Vec<u64> = handles.iter().map(|h| h.to_raw()).collect();
    for value in &raw {
        println!("Handle: {value:#018x}");
    }

    // 4. Resolve a raw value coming back from external code
    // 4. 解析从外部代码传回的原始值
    let stone = Handle::from_raw(raw[1]);
    if let Some(ptr) = table.get(stone) {
        // SAFETY: `textures` outlives every use of the table
        println!("\nResolved: {}", unsafe { &*ptr }.name);
    }

    // 5. Iterate over live entries
    // 5. 遍历占用的 entry
    println!("\nIterating:");
    for (handle, ptr) in table.iter() {
        // SAFETY: every registered pointer targets an element of `textures`
        println!("{handle}: {}", unsafe { &*ptr }.name);
    }

    // 6. Release a handle
    // 6. 释放 handle
    println!("\nReleasing grass...");
    println!("Released: {}", table.deallocate(handles[0]));
    println!("Released again: {}", table.deallocate(handles[0]));

    // 7. Demonstrate reuse of slots
    // 7. 演示 slot 复用
    let reused = table.allocate().expect("out of memory");
    table.set(reused, &mut textures[2]);
    println!("\nNew handle {reused} (same slot, new generation)");
    println!("Old handle still valid? {}", table.contains(handles[0]));
    println!(
        "Live: {}, capacity: {}, height: {}",
        table.len(),
        table.capacity(),
        table.height()
    );
}
